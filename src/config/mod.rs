pub mod schema;

pub use schema::SqlTalkConfig;

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Name of the config file inside the home directory.
pub const CONFIG_FILE: &str = "sqltalk.toml";

/// Default sqltalk home directory (~/.sqltalk).
pub fn default_home_dir() -> PathBuf {
    directories::BaseDirs::new()
        .map(|d| d.home_dir().join(".sqltalk"))
        .unwrap_or_else(|| PathBuf::from(".sqltalk"))
}

/// Load config from the given path, or return defaults.
pub fn load_config(path: &Path) -> Result<SqlTalkConfig> {
    if path.exists() {
        let contents =
            std::fs::read_to_string(path).context("Failed to read sqltalk config file")?;
        let config: SqlTalkConfig =
            toml::from_str(&contents).context("Failed to parse sqltalk config (TOML)")?;
        Ok(config)
    } else {
        Ok(SqlTalkConfig::default())
    }
}

/// Save config to the given path (TOML format).
pub fn save_config(config: &SqlTalkConfig, path: &Path) -> Result<()> {
    let contents = toml::to_string_pretty(config).context("Failed to serialize config")?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, contents).context("Failed to write config file")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let path = std::env::temp_dir().join("sqltalk-does-not-exist/sqltalk.toml");
        let cfg = load_config(&path).unwrap();
        assert_eq!(cfg.max_bytes_billed, 100_000_000);
    }
}
