//! Pipeline Runner
//!
//! Drives the stages on their own intervals until stopped: analyzer and
//! trader every analyze interval, the position monitor every monitor
//! interval, and the optimizer whenever its schedule says a run is due.
//! Stage errors are logged and the loop carries on.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use thiserror::Error;
use tokio::sync::{Notify, RwLock};
use tokio::time::MissedTickBehavior;

use super::analyzer::{AnalyzeSummary, Analyzer, AnalyzerError};
use super::context::PipelineContext;
use super::monitor::{MonitorError, MonitorSummary, PositionMonitor};
use super::optimizer::{OptimizerError, ParameterOptimizer};
use super::trader::{TradeSummary, Trader, TraderError};
use crate::domain::OptimizationRun;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Analyzer error: {0}")]
    Analyzer(#[from] AnalyzerError),
    #[error("Trader error: {0}")]
    Trader(#[from] TraderError),
    #[error("Monitor error: {0}")]
    Monitor(#[from] MonitorError),
    #[error("Optimizer error: {0}")]
    Optimizer(#[from] OptimizerError),
}

/// Loop intervals
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Schedule {
    pub analyze_every: Duration,
    pub monitor_every: Duration,
    pub optimizer_check_every: Duration,
}

impl Default for Schedule {
    fn default() -> Self {
        Self {
            analyze_every: Duration::from_secs(5),
            monitor_every: Duration::from_secs(30),
            optimizer_check_every: Duration::from_secs(3600),
        }
    }
}

impl Schedule {
    pub fn from_config(config: &crate::config::Config) -> Self {
        Self {
            analyze_every: Duration::from_secs(config.pipeline.analyze_interval_secs),
            monitor_every: Duration::from_secs(config.pipeline.monitor_interval_secs),
            optimizer_check_every: Duration::from_secs(config.pipeline.optimizer_check_interval_secs),
        }
    }
}

/// Outcome of one analyze/trade/monitor cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub analyzed: AnalyzeSummary,
    pub traded: TradeSummary,
    pub monitored: MonitorSummary,
}

/// Cheap to clone; clones share the stages and the running flag
#[derive(Clone)]
pub struct Pipeline {
    analyzer: Arc<Analyzer>,
    trader: Arc<Trader>,
    monitor: Arc<PositionMonitor>,
    optimizer: Arc<ParameterOptimizer>,
    schedule: Schedule,
    is_running: Arc<RwLock<bool>>,
    shutdown: Arc<Notify>,
}

impl Pipeline {
    pub fn new(ctx: Arc<PipelineContext>) -> Self {
        Self {
            analyzer: Arc::new(Analyzer::new(Arc::clone(&ctx))),
            trader: Arc::new(Trader::new(Arc::clone(&ctx))),
            monitor: Arc::new(PositionMonitor::new(Arc::clone(&ctx))),
            optimizer: Arc::new(ParameterOptimizer::new(ctx)),
            schedule: Schedule::default(),
            is_running: Arc::new(RwLock::new(false)),
            shutdown: Arc::new(Notify::new()),
        }
    }

    pub fn with_schedule(mut self, schedule: Schedule) -> Self {
        self.schedule = schedule;
        self
    }

    pub fn analyzer(&self) -> &Analyzer {
        &self.analyzer
    }

    pub fn trader(&self) -> &Trader {
        &self.trader
    }

    pub fn monitor(&self) -> &PositionMonitor {
        &self.monitor
    }

    pub fn optimizer(&self) -> &ParameterOptimizer {
        &self.optimizer
    }

    pub async fn is_running(&self) -> bool {
        *self.is_running.read().await
    }

    /// Run until `stop` is called
    pub async fn run(&self) -> Result<(), PipelineError> {
        *self.is_running.write().await = true;
        tracing::info!(
            "Starting pipeline - analyze every {:?}, monitor every {:?}, optimizer check every {:?}",
            self.schedule.analyze_every,
            self.schedule.monitor_every,
            self.schedule.optimizer_check_every
        );

        let mut analyze = tokio::time::interval(self.schedule.analyze_every);
        let mut monitor = tokio::time::interval(self.schedule.monitor_every);
        let mut optimize = tokio::time::interval(self.schedule.optimizer_check_every);
        for interval in [&mut analyze, &mut monitor, &mut optimize] {
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        }

        while *self.is_running.read().await {
            tokio::select! {
                _ = analyze.tick() => {
                    if let Err(e) = self.analyze_and_trade().await {
                        tracing::error!("Analyze cycle error: {}", e);
                    }
                }
                _ = monitor.tick() => {
                    if let Err(e) = self.monitor.run_pass(Utc::now()).await {
                        tracing::error!("Monitor pass error: {}", e);
                    }
                }
                _ = optimize.tick() => {
                    if let Err(e) = self.optimizer.tick(Utc::now()).await {
                        tracing::error!("Optimizer error: {}", e);
                    }
                }
                _ = self.shutdown.notified() => {}
            }
        }

        tracing::info!("Pipeline stopped");
        Ok(())
    }

    /// Analyze pending candidates, then act on the resulting decisions
    pub async fn analyze_and_trade(&self) -> Result<(AnalyzeSummary, TradeSummary), PipelineError> {
        let analyzed = self.analyzer.process_batch(Utc::now()).await?;
        let traded = self.trader.process_batch(Utc::now()).await?;
        Ok((analyzed, traded))
    }

    /// One full cycle without waiting on any interval
    pub async fn tick(&self) -> Result<CycleReport, PipelineError> {
        let (analyzed, traded) = self.analyze_and_trade().await?;
        let monitored = self.monitor.run_pass(Utc::now()).await?;
        Ok(CycleReport { analyzed, traded, monitored })
    }

    /// Run the optimizer now, regardless of schedule
    pub async fn optimize_now(&self) -> Result<OptimizationRun, PipelineError> {
        Ok(self.optimizer.run_at(Utc::now()).await?)
    }

    pub async fn stop(&self) {
        *self.is_running.write().await = false;
        self.shutdown.notify_one();
        tracing::info!("Pipeline stop requested");
    }
}
