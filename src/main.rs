//! sqltalk: chat with a BigQuery dataset through Gemini function calling.
//!
//! Usage:
//!   sqltalk init             Write a default config file
//!   sqltalk chat             Start an interactive session
//!   sqltalk ask "<question>" Answer a single question
//!   sqltalk tools            List the tools offered to the model

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{error, info};

use sqltalk::agent::{prompt, AgentError};
use sqltalk::config::{self, SqlTalkConfig};
use sqltalk::model::GeminiClient;
use sqltalk::session::{render_trace, render_transcript, Session, SessionSettings};
use sqltalk::tools;
use sqltalk::types::Turn;
use sqltalk::warehouse::BigQueryClient;

// ---------------------------------------------------------------------------
// CLI definition
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(name = "sqltalk")]
#[command(version = "0.1.0")]
#[command(about = "Ask questions about a BigQuery dataset in plain language")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the sqltalk home directory (default: ~/.sqltalk).
    #[arg(long)]
    home: Option<String>,

    /// Log level (debug, info, warn, error). Overrides the config file.
    #[arg(long)]
    log_level: Option<String>,

    /// Dataset to answer questions about (project.dataset).
    #[arg(long)]
    dataset: Option<String>,

    /// Gemini model name.
    #[arg(long)]
    model: Option<String>,

    /// Sampling temperature.
    #[arg(long)]
    temperature: Option<f32>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Write a default config file to the home directory.
    Init,

    /// Start an interactive session.
    Chat,

    /// Answer a single question and exit.
    Ask {
        /// The question to ask.
        question: String,
    },

    /// List the tools offered to the model.
    Tools,
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let home_dir = match &cli.home {
        Some(home) => PathBuf::from(shellexpand::tilde(home).into_owned()),
        None => config::default_home_dir(),
    };
    let config_path = home_dir.join(config::CONFIG_FILE);
    let mut cfg = config::load_config(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;
    apply_overrides(&mut cfg, &cli);

    // Initialize logging
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cfg.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Init => cmd_init(&cfg, &config_path),
        Commands::Chat => cmd_chat(&cfg).await,
        Commands::Ask { ref question } => cmd_ask(&cfg, question).await,
        Commands::Tools => cmd_tools(),
    }
}

fn apply_overrides(cfg: &mut SqlTalkConfig, cli: &Cli) {
    if let Some(level) = &cli.log_level {
        cfg.log_level = level.clone();
    }
    if let Some(dataset) = &cli.dataset {
        cfg.dataset_id = dataset.clone();
    }
    if let Some(model) = &cli.model {
        cfg.model = model.clone();
    }
    if let Some(temperature) = cli.temperature {
        cfg.temperature = temperature;
    }
}

// ---------------------------------------------------------------------------
// Command implementations
// ---------------------------------------------------------------------------

fn cmd_init(cfg: &SqlTalkConfig, config_path: &Path) -> Result<()> {
    if config_path.exists() {
        println!("Config already exists at {}", config_path.display());
        return Ok(());
    }
    config::save_config(cfg, config_path)?;
    println!("Wrote {}", config_path.display());
    Ok(())
}

fn cmd_tools() -> Result<()> {
    for spec in tools::tool_definitions() {
        println!("{}", spec.name.bold());
        println!("  {}", spec.description);
        if let Some(props) = spec.parameters["properties"].as_object() {
            for (name, schema) in props {
                println!(
                    "    {} ({}): {}",
                    name.cyan(),
                    schema["type"].as_str().unwrap_or("any"),
                    schema["description"].as_str().unwrap_or_default()
                );
            }
        }
        println!();
    }
    Ok(())
}

async fn cmd_ask(cfg: &SqlTalkConfig, question: &str) -> Result<()> {
    let model = GeminiClient::new(cfg)?;
    let mut session = Session::new(SessionSettings::from_config(cfg));

    let warehouse = BigQueryClient::new(cfg)?;
    match session.submit(&model, &warehouse, question).await {
        Ok(turn) => {
            print_answer(turn);
            Ok(())
        }
        Err(e) => {
            print_failure(&e);
            Err(e.into())
        }
    }
}

async fn cmd_chat(cfg: &SqlTalkConfig) -> Result<()> {
    let model = GeminiClient::new(cfg)?;
    let mut session = Session::new(SessionSettings::from_config(cfg));

    println!(
        "{} Talking to '{}' (model: {})",
        ">>>".green().bold(),
        cfg.dataset_id,
        cfg.model
    );
    println!("Sample prompts:");
    for sample in prompt::SAMPLE_PROMPTS {
        println!("  - {}", sample.dimmed());
    }
    println!(
        "Commands: {} {} {} {}\n",
        "/history".cyan(),
        "/reset".cyan(),
        "/tools".cyan(),
        "/quit".cyan()
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    loop {
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();

        match line {
            "" => continue,
            "/quit" | "/exit" => break,
            "/reset" => {
                session.reset();
                println!("Session cleared.\n");
                continue;
            }
            "/history" => {
                println!("{}", render_transcript(session.transcript()));
                continue;
            }
            "/tools" => {
                cmd_tools()?;
                continue;
            }
            _ => {}
        }

        // The warehouse client lives for one question only.
        let warehouse = BigQueryClient::new(cfg)?;
        match session.submit(&model, &warehouse, line).await {
            Ok(turn) => print_answer(turn),
            Err(e) => {
                error!("Exchange failed: {}", e);
                print_failure(&e);
            }
        }
    }

    info!("Session ended after {} turns", session.transcript().len());
    Ok(())
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn print_answer(turn: &Turn) {
    println!("\n{}\n", turn.content);
    if !turn.trace.is_empty() {
        println!("{}", "Function calls, parameters, and responses:".bold());
        println!("{}", render_trace(&turn.trace).dimmed());
    }
}

fn print_failure(err: &AgentError) {
    eprintln!("{} {}", "Error:".red().bold(), err);
    if let AgentError::ToolBudgetExhausted { trace, .. } = err {
        eprintln!("{}", render_trace(trace).dimmed());
    }
}
