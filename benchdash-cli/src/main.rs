//! Benchdash CLI: terminal client for the inference benchmarking dashboard.
//!
//! Provides one-shot snapshot/health queries, a live metrics watch mode, and
//! user-triggered sequential benchmark runs.

mod commands;

use benchdash_core::types::{ModelSize, OptimizationMode};
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Benchdash: live dashboard for model-inference benchmarking
#[derive(Parser, Debug)]
#[command(name = "benchdash", version, about, long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Backend base URL (overrides configuration)
    #[arg(short, long)]
    base_url: Option<String>,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Fetch and display the current aggregate metrics snapshot
    Snapshot,
    /// Follow the live metrics stream, printing updates as they arrive
    Watch {
        /// Seconds between display refreshes
        #[arg(long, default_value_t = 1)]
        interval: u64,
    },
    /// Run a sequential benchmark across optimization modes
    Bench {
        /// Prompt text to benchmark with
        text: String,

        /// Comma-separated modes to run, in order (default: all)
        #[arg(short, long, value_delimiter = ',')]
        modes: Vec<OptimizationMode>,

        /// Model size: small (gpt2) or medium (gpt2-medium)
        #[arg(long)]
        model_size: Option<ModelSize>,

        /// Maximum tokens to generate per request
        #[arg(long)]
        max_new_tokens: Option<u32>,
    },
    /// Submit a single inference request
    Infer {
        /// Prompt text
        text: String,

        /// Optimization mode
        #[arg(short, long, default_value = "baseline")]
        mode: OptimizationMode,

        /// Model size: small (gpt2) or medium (gpt2-medium)
        #[arg(long)]
        model_size: Option<ModelSize>,

        /// Maximum tokens to generate
        #[arg(long)]
        max_new_tokens: Option<u32>,
    },
    /// Show persisted measurement history, newest first
    History {
        /// Limit output to one optimization mode
        #[arg(short, long)]
        mode: Option<OptimizationMode>,

        /// Maximum number of records to fetch
        #[arg(long, default_value_t = 100)]
        limit: u32,
    },
    /// Query backend health
    Health,
    /// List the backend's model servers
    Models,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .init();

    let mut config = benchdash_core::load_config(cli.config.as_deref())
        .map_err(|e| anyhow::anyhow!("failed to load configuration: {}", e))?;
    if let Some(base_url) = cli.base_url {
        config.base_url = base_url;
    }
    config.validate()?;

    match cli.command {
        Commands::Snapshot => commands::snapshot(&config).await,
        Commands::Watch { interval } => commands::watch(&config, interval).await,
        Commands::Bench {
            text,
            modes,
            model_size,
            max_new_tokens,
        } => commands::bench(&config, &text, modes, model_size, max_new_tokens).await,
        Commands::Infer {
            text,
            mode,
            model_size,
            max_new_tokens,
        } => commands::infer(&config, &text, mode, model_size, max_new_tokens).await,
        Commands::History { mode, limit } => commands::history(&config, mode, limit).await,
        Commands::Health => commands::health(&config).await,
        Commands::Models => commands::models(&config).await,
    }
}
