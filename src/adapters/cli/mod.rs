//! CLI Adapter
//!
//! Command-line interface for the migration sniper.
//! Uses clap derive macros for argument parsing.

mod commands;

pub use commands::{
    build_context, AnalyzeCmd, CliApp, Command, ConfigAction, ConfigCmd, MetricsCmd, MonitorCmd, OptimizeCmd, RunCmd,
};

use anyhow::Result;

use crate::config::Config;

/// Initialize the CLI application
pub fn init() -> CliApp {
    use clap::Parser;
    CliApp::parse()
}

/// Execute the CLI command
pub async fn execute(app: CliApp, config: Config) -> Result<()> {
    commands::execute(app, config).await
}
