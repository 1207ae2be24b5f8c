//! Migration Sniper - Adaptive trading pipeline for migrated memecoins
//!
//! Scores migrated tokens, paper-trades the best with tiered stop-loss and
//! take-profit, and re-tunes its own parameters from realized results.

use std::fs::OpenOptions;
use std::sync::Mutex;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

use migration_sniper::adapters::cli::{self, CliApp};
use migration_sniper::config::{load_or_default, Config};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if it exists (secrets go here, not in sniper.toml)
    dotenvy::dotenv().ok();

    let app = CliApp::parse();
    let config = load_or_default(&app.config)
        .with_context(|| format!("Failed to load configuration from {}", app.config.display()))?;
    init_logging(app.verbose, app.debug, &config)?;

    cli::execute(app, config).await
}

fn init_logging(verbose: bool, debug: bool, config: &Config) -> Result<()> {
    let filter = if debug {
        EnvFilter::new("debug")
    } else if verbose {
        EnvFilter::new("info")
    } else {
        EnvFilter::try_new(&config.logging.level).unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    if config.logging.log_to_file {
        let path = config.log_file_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create log directory {}", parent.display()))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("Failed to open log file {}", path.display()))?;
        fmt()
            .with_env_filter(filter)
            .with_ansi(false)
            .with_writer(Mutex::new(file))
            .init();
    } else {
        fmt().with_env_filter(filter).init();
    }
    Ok(())
}
