//! CLI Command Handlers
//!
//! Argument definitions and the handlers behind each subcommand. Handlers
//! assemble the production adapters into a `PipelineContext` and drive the
//! application stages.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::{Duration, Utc};
use clap::{Parser, Subcommand};

use crate::adapters::discovery;
use crate::adapters::market_data::JupiterPriceClient;
use crate::adapters::oracle::HttpScoringOracle;
use crate::adapters::paper::PaperExecution;
use crate::adapters::queue::InProcessQueue;
use crate::adapters::secrets::EnvSecretStore;
use crate::adapters::storage::FileStores;
use crate::application::{Pipeline, PipelineContext, PipelineSettings, Schedule, TradeOutcome};
use crate::config::{Config, DEFAULT_CONFIG_PATH};
use crate::domain::{aggregate, aggregate_by_arm, ConfigDocument, PerformanceMetrics, TradeDecision};
use crate::ports::{topics, ScoringOracle, SecretStore};

/// Migration Sniper - multi-factor scoring and adaptive trading for migrated memecoins
#[derive(Parser, Debug)]
#[command(
    name = "migration-sniper",
    version = env!("CARGO_PKG_VERSION"),
    about = "Scores migrated memecoins, trades the best and re-tunes itself from the results",
    long_about = "Migration Sniper scores tokens that migrated after graduating from their launch \
                  platform, paper-trades the ones above threshold with tiered stop-loss and \
                  take-profit, and periodically re-tunes its parameters through A/B rollouts."
)]
pub struct CliApp {
    /// The command to execute
    #[command(subcommand)]
    pub command: Command,

    /// Path to configuration file
    #[arg(short, long, global = true, value_name = "FILE", default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the full pipeline until interrupted
    Run(RunCmd),

    /// Score a JSON-lines file of candidates and trade the decisions
    Analyze(AnalyzeCmd),

    /// Run one position monitoring pass
    Monitor(MonitorCmd),

    /// Run the parameter optimizer
    Optimize(OptimizeCmd),

    /// Print performance metrics
    Metrics(MetricsCmd),

    /// Show or initialise configuration
    Config(ConfigCmd),
}

#[derive(Parser, Debug)]
pub struct RunCmd {
    /// Candidates to enqueue before the loop starts
    #[arg(long, value_name = "FILE")]
    pub candidates: Option<PathBuf>,
}

#[derive(Parser, Debug)]
pub struct AnalyzeCmd {
    /// JSON-lines file, one candidate per line
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Score and record only; do not route decisions to the trader
    #[arg(long)]
    pub no_trade: bool,
}

#[derive(Parser, Debug)]
pub struct MonitorCmd {
    /// Close this trade manually instead of running a pass
    #[arg(long, value_name = "TRADE_ID")]
    pub close: Option<String>,
}

#[derive(Parser, Debug)]
pub struct OptimizeCmd {
    /// Run even if the schedule says it is not due
    #[arg(short, long)]
    pub force: bool,
}

#[derive(Parser, Debug)]
pub struct MetricsCmd {
    /// Lookback window in days
    #[arg(short, long, value_name = "DAYS", default_value = "30")]
    pub days: i64,

    /// Break metrics down by A/B arm
    #[arg(long)]
    pub by_arm: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Parser, Debug)]
pub struct ConfigCmd {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Print the runtime configuration and the current agent configuration
    Show,
    /// Write a default config file and agent configuration
    Init {
        /// Overwrite an existing config file
        #[arg(long)]
        force: bool,
    },
}

/// Execute the parsed command
pub async fn execute(app: CliApp, config: Config) -> Result<()> {
    match app.command {
        Command::Run(cmd) => run_command(cmd, &config).await,
        Command::Analyze(cmd) => analyze_command(cmd, &config).await,
        Command::Monitor(cmd) => monitor_command(cmd, &config).await,
        Command::Optimize(cmd) => optimize_command(cmd, &config).await,
        Command::Metrics(cmd) => metrics_command(cmd, &config).await,
        Command::Config(cmd) => config_command(cmd, &app.config, &config).await,
    }
}

/// Assemble the production adapters
pub fn build_context(config: &Config) -> Result<Arc<PipelineContext>> {
    let data_dir = config.paths.data_dir();
    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("Failed to create data directory {}", data_dir.display()))?;
    let stores = FileStores::open(&data_dir);

    let prices = JupiterPriceClient::new(config.price_api.get_url(), config.timeouts.price())
        .context("Failed to create price client")?;

    let oracle: Option<Arc<dyn ScoringOracle>> = match config.oracle.get_endpoint() {
        Some(endpoint) => {
            let api_key = EnvSecretStore::new().secret(&config.oracle.api_key_secret);
            let client = HttpScoringOracle::new(endpoint, config.timeouts.oracle())
                .context("Failed to create scoring oracle client")?
                .with_api_key(api_key);
            Some(Arc::new(client))
        }
        None => {
            tracing::warn!("No scoring oracle endpoint configured; optimizer runs will be logged as failed");
            None
        }
    };

    Ok(Arc::new(PipelineContext {
        queue: Arc::new(InProcessQueue::new()),
        trades: Arc::new(stores.trades),
        analyses: Arc::new(stores.analyses),
        configs: Arc::new(stores.config),
        optimizations: Arc::new(stores.optimizations),
        prices: Arc::new(prices),
        execution: Arc::new(PaperExecution::new(config.trading.paper_slippage)),
        oracle,
        settings: PipelineSettings::from_config(config),
    }))
}

async fn run_command(cmd: RunCmd, config: &Config) -> Result<()> {
    tracing::info!("Starting migration sniper...");
    tracing::warn!("PAPER TRADING MODE - fills are simulated");

    let ctx = build_context(config)?;
    if let Some(path) = cmd.candidates {
        discovery::publish_file(&path, ctx.queue.as_ref())
            .await
            .with_context(|| format!("Failed to load candidates from {}", path.display()))?;
    }

    let pipeline = Pipeline::new(ctx).with_schedule(Schedule::from_config(config));

    // Setup Ctrl+C handler
    let handle = pipeline.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        tracing::info!("Shutdown signal received");
        handle.stop().await;
    });

    pipeline.run().await?;
    tracing::info!("Migration sniper stopped");
    Ok(())
}

async fn analyze_command(cmd: AnalyzeCmd, config: &Config) -> Result<()> {
    let ctx = build_context(config)?;
    let summary = discovery::publish_file(&cmd.file, ctx.queue.as_ref())
        .await
        .with_context(|| format!("Failed to load candidates from {}", cmd.file.display()))?;

    let pipeline = Pipeline::new(Arc::clone(&ctx));
    let analyzed = pipeline.analyzer().process_batch(Utc::now()).await?;

    println!("Candidates:  {} loaded, {} unreadable lines", summary.published, summary.skipped);
    println!(
        "Analyzed:    {} ({} decisions, {} dropped)",
        analyzed.analyzed, analyzed.decisions, analyzed.dropped
    );

    if cmd.no_trade {
        while let Some(delivery) = ctx.queue.receive(topics::DECISIONS).await? {
            if let Ok(decision) = serde_json::from_value::<TradeDecision>(delivery.payload.clone()) {
                println!(
                    "  {} score {:.3} quality {} {} [arm {}]",
                    decision.token_address,
                    decision.overall_score,
                    decision.quality_score,
                    decision.recommendation,
                    decision.arm
                );
            }
            ctx.queue.ack(delivery.id).await?;
        }
        return Ok(());
    }

    let document = ctx.load_document().await?;
    while let Some(delivery) = ctx.queue.receive(topics::DECISIONS).await? {
        let decision: TradeDecision = serde_json::from_value(delivery.payload.clone())
            .context("Malformed decision on the queue")?;
        match pipeline.trader().execute(&decision, &document, Utc::now()).await {
            Ok(TradeOutcome::Opened(trade)) => println!(
                "  OPENED  {} {} ${:.2} @ {:.8} (SL {:.0}% / TP {:.0}%)",
                trade.trade_id,
                trade.token_address,
                trade.amount_usd,
                trade.entry_price,
                trade.parameters.stop_loss_pct * 100.0,
                trade.parameters.take_profit_pct * 100.0
            ),
            Ok(TradeOutcome::Skipped(reason)) => println!("  SKIPPED {}: {}", decision.token_address, reason),
            Err(e) => println!("  FAILED  {}: {}", decision.token_address, e),
        }
        ctx.queue.ack(delivery.id).await?;
    }
    Ok(())
}

async fn monitor_command(cmd: MonitorCmd, config: &Config) -> Result<()> {
    let ctx = build_context(config)?;
    let pipeline = Pipeline::new(ctx);

    if let Some(trade_id) = cmd.close {
        let trade = pipeline
            .monitor()
            .close_manual(&trade_id, Utc::now())
            .await
            .with_context(|| format!("Failed to close {}", trade_id))?;
        println!(
            "Closed {} @ {:.8}: P&L ${:.2}",
            trade.trade_id,
            trade.exit_price.unwrap_or_default(),
            trade.pnl.unwrap_or_default()
        );
        return Ok(());
    }

    let summary = pipeline.monitor().run_pass(Utc::now()).await?;
    println!(
        "Checked {} open trades: {} closed, {} held, {} errors",
        summary.checked, summary.closed, summary.held, summary.errors
    );
    Ok(())
}

async fn optimize_command(cmd: OptimizeCmd, config: &Config) -> Result<()> {
    let ctx = build_context(config)?;
    let pipeline = Pipeline::new(ctx);

    let run = if cmd.force {
        Some(pipeline.optimize_now().await?)
    } else {
        pipeline.optimizer().tick(Utc::now()).await?
    };

    match run {
        Some(run) => {
            println!("Optimization {}: {}", run.optimization_id, run.status);
            println!("Trades considered: {}", run.trades_considered);
            if let Some(message) = run.message {
                println!("Note: {}", message);
            }
            for (key, value) in &run.best_params {
                println!("  {} = {}", key, value);
            }
            if let Some(key) = run.backup_key {
                println!("Backup: {}", key);
            }
        }
        None => println!("Optimizer not due yet (use --force to run now)"),
    }
    Ok(())
}

async fn metrics_command(cmd: MetricsCmd, config: &Config) -> Result<()> {
    if cmd.days <= 0 {
        bail!("--days must be positive, got {}", cmd.days);
    }
    let ctx = build_context(config)?;
    let trades = ctx
        .trades
        .trades_since(Utc::now() - Duration::days(cmd.days))
        .await
        .context("Failed to load trades")?;

    if cmd.by_arm {
        let by_arm = aggregate_by_arm(&trades);
        if cmd.json {
            println!("{}", serde_json::to_string_pretty(&by_arm)?);
        } else {
            for (arm, metrics) in &by_arm {
                println!("=== Arm {} ===", arm);
                print_metrics(metrics);
            }
        }
        return Ok(());
    }

    let metrics = aggregate(&trades);
    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&metrics)?);
    } else {
        println!("=== Last {} days ===", cmd.days);
        print_metrics(&metrics);
    }
    Ok(())
}

fn print_metrics(metrics: &PerformanceMetrics) {
    println!("Trades:        {} ({} closed)", metrics.total_trades, metrics.closed_trades);
    println!("Win rate:      {:.1}%", metrics.win_rate * 100.0);
    println!("Total P&L:     ${:.2}", metrics.total_pnl);
    println!("Average P&L:   ${:.2}", metrics.avg_pnl);
    println!("Max drawdown:  {:.1}%", metrics.max_drawdown * 100.0);
    println!("Sharpe:        {:.2}", metrics.sharpe_ratio);
    println!("Avg duration:  {:.1}h", metrics.avg_trade_duration_hours);
}

async fn config_command(cmd: ConfigCmd, path: &Path, config: &Config) -> Result<()> {
    match cmd.action {
        ConfigAction::Show => {
            println!("# Runtime configuration ({})", path.display());
            println!("{}", config.to_toml()?);

            let ctx = build_context(config)?;
            let document = ctx.load_document().await?;
            println!("# Agent configuration");
            println!("{}", serde_json::to_string_pretty(&document)?);
            Ok(())
        }
        ConfigAction::Init { force } => {
            if path.exists() && !force {
                bail!("{} already exists (use --force to overwrite)", path.display());
            }
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(path, Config::default().to_toml()?)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!("Wrote {}", path.display());

            let ctx = build_context(config)?;
            if ctx.configs.load_current().await?.is_none() {
                ctx.configs.save_current(&ConfigDocument::default()).await?;
                println!("Stored default agent configuration in {}", config.paths.data_dir().display());
            }
            Ok(())
        }
    }
}
