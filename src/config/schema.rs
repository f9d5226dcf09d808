//! Configuration schema for sqltalk.toml.

use serde::{Deserialize, Serialize};

/// Environment variable consulted when `model_api_key` is empty.
pub const MODEL_API_KEY_ENV: &str = "GEMINI_API_KEY";

/// Environment variable consulted when `warehouse_access_token` is empty.
pub const WAREHOUSE_TOKEN_ENV: &str = "BIGQUERY_ACCESS_TOKEN";

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SqlTalkConfig {
    /// Dataset the assistant answers questions about (`project.dataset`).
    pub dataset_id: String,

    /// Project billed for query jobs. Falls back to the dataset's project.
    pub billing_project: String,

    /// Location for query jobs (e.g. "US"); empty lets BigQuery decide.
    pub query_location: String,

    /// BigQuery REST API base URL.
    pub warehouse_api_url: String,

    /// OAuth bearer token for BigQuery.
    pub warehouse_access_token: String,

    /// Upper bound on bytes a single query may bill.
    pub max_bytes_billed: u64,

    /// Gemini REST API base URL.
    pub model_api_url: String,

    /// Gemini API key.
    pub model_api_key: String,

    /// Gemini model name.
    pub model: String,

    /// Sampling temperature.
    pub temperature: f32,

    /// Tool calls allowed per submission before the exchange is aborted.
    pub max_tool_calls: u32,

    /// Replay earlier answers to the model as context for new questions.
    pub include_history: bool,

    /// HTTP timeout for model and warehouse requests, in seconds.
    pub request_timeout_secs: u64,

    /// Log level (debug, info, warn, error).
    pub log_level: String,
}

impl Default for SqlTalkConfig {
    fn default() -> Self {
        Self {
            dataset_id: "bigquery-public-data.ga4_obfuscated_sample_ecommerce".into(),
            billing_project: String::new(),
            query_location: String::new(),
            warehouse_api_url: "https://bigquery.googleapis.com/bigquery/v2".into(),
            warehouse_access_token: String::new(),
            max_bytes_billed: 100_000_000,
            model_api_url: "https://generativelanguage.googleapis.com/v1beta".into(),
            model_api_key: String::new(),
            model: "gemini-1.5-pro-001".into(),
            temperature: 0.0,
            max_tool_calls: 16,
            include_history: false,
            request_timeout_secs: 120,
            log_level: "info".into(),
        }
    }
}

impl SqlTalkConfig {
    /// Gemini API key from config, else from the environment.
    pub fn resolved_model_api_key(&self) -> String {
        resolve_secret(&self.model_api_key, MODEL_API_KEY_ENV)
    }

    /// BigQuery token from config, else from the environment.
    pub fn resolved_warehouse_token(&self) -> String {
        resolve_secret(&self.warehouse_access_token, WAREHOUSE_TOKEN_ENV)
    }

    /// Project that owns the configured dataset, if the id is qualified.
    pub fn dataset_project(&self) -> Option<&str> {
        self.dataset_id
            .split_once('.')
            .map(|(project, _)| project)
            .filter(|p| !p.is_empty())
    }

    /// Project that query jobs run (and bill) in.
    pub fn effective_billing_project(&self) -> &str {
        if !self.billing_project.is_empty() {
            &self.billing_project
        } else {
            self.dataset_project().unwrap_or_default()
        }
    }
}

fn resolve_secret(configured: &str, env_var: &str) -> String {
    if !configured.is_empty() {
        return configured.to_string();
    }
    std::env::var(env_var).unwrap_or_default()
}
