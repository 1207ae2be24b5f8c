//! Parameter Optimizer
//!
//! Periodic feedback loop over realized trades:
//!
//! 1. pull trades from the lookback window
//! 2. stop with `insufficient_data` below the minimum trade count
//! 3. aggregate performance metrics
//! 4. ask the scoring oracle for better parameters (bounded by a timeout)
//! 5. overlay the candidate onto the current base configuration as arm B
//! 6. persist the A/B document as current, with a timestamped backup
//!
//! Every run, whatever its outcome, is appended to the optimization log.
//! Nothing is written to the configuration store before step 6, so a run
//! that stops early leaves the system untouched. Only one run may be in
//! progress at a time.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use super::context::{bounded, PipelineContext};
use crate::domain::{
    aggregate, AbTestConfig, ConfigDocument, OptimizationRun, OracleRequest, RunStatus,
};
use crate::ports::PortError;

#[derive(Debug, Error)]
pub enum OptimizerError {
    #[error("An optimization run is already in progress")]
    AlreadyRunning,
    #[error("Port error: {0}")]
    Port(#[from] PortError),
}

pub struct ParameterOptimizer {
    ctx: Arc<PipelineContext>,
    run_lock: Mutex<()>,
}

impl ParameterOptimizer {
    pub fn new(ctx: Arc<PipelineContext>) -> Self {
        Self { ctx, run_lock: Mutex::new(()) }
    }

    /// Whether the configured interval has passed since the last logged run
    pub async fn is_due(&self, now: DateTime<Utc>) -> Result<bool, OptimizerError> {
        let document = self.ctx.load_document().await?;
        let interval = document.base().optimizer.interval();
        let runs = bounded(self.ctx.settings.store_timeout, "optimization log", self.ctx.optimizations.runs()).await?;

        Ok(match runs.iter().map(|r| r.timestamp).max() {
            Some(last) => now - last >= interval,
            None => true,
        })
    }

    /// Run when due; `None` when the interval has not elapsed
    pub async fn tick(&self, now: DateTime<Utc>) -> Result<Option<OptimizationRun>, OptimizerError> {
        if !self.is_due(now).await? {
            return Ok(None);
        }
        self.run_at(now).await.map(Some)
    }

    /// One optimizer run. Refuses with `AlreadyRunning` instead of waiting
    /// when another run holds the lock.
    pub async fn run_at(&self, now: DateTime<Utc>) -> Result<OptimizationRun, OptimizerError> {
        let _guard = self.run_lock.try_lock().map_err(|_| OptimizerError::AlreadyRunning)?;

        info!("Starting optimization run");
        let run = self.optimize(now).await;
        match run.status {
            RunStatus::Promoted => info!(
                "Optimization {} promoted a new A/B configuration ({})",
                run.optimization_id,
                run.backup_key.as_deref().unwrap_or("no backup")
            ),
            RunStatus::OracleFailed | RunStatus::StoreFailed => error!(
                "Optimization {} {}: {}",
                run.optimization_id,
                run.status,
                run.message.as_deref().unwrap_or_default()
            ),
            _ => info!(
                "Optimization {} finished without changes: {} ({})",
                run.optimization_id,
                run.status,
                run.message.as_deref().unwrap_or_default()
            ),
        }

        if let Err(e) = bounded(
            self.ctx.settings.store_timeout,
            "optimization log",
            self.ctx.optimizations.append(&run),
        )
        .await
        {
            error!("Failed to log optimization {}: {}", run.optimization_id, e);
        }
        Ok(run)
    }

    async fn optimize(&self, now: DateTime<Utc>) -> OptimizationRun {
        let settings = &self.ctx.settings;

        let document = match self.ctx.load_document().await {
            Ok(document) => document,
            Err(e) => {
                return OptimizationRun::new(now, RunStatus::StoreFailed, 0)
                    .with_message(format!("failed to load configuration: {}", e))
            }
        };
        let base = document.base().clone();
        let optimizer = &base.optimizer;

        let since = now - Duration::days(optimizer.lookback_days);
        let trades = match bounded(settings.store_timeout, "trade history", self.ctx.trades.trades_since(since)).await {
            Ok(trades) => trades,
            Err(e) => {
                return OptimizationRun::new(now, RunStatus::StoreFailed, 0)
                    .with_message(format!("failed to load trade history: {}", e))
            }
        };

        if trades.len() < optimizer.min_trades_for_optimization {
            return OptimizationRun::new(now, RunStatus::InsufficientData, trades.len()).with_message(format!(
                "{} trades in the last {} days, need {}",
                trades.len(),
                optimizer.lookback_days,
                optimizer.min_trades_for_optimization
            ));
        }

        let metrics = aggregate(&trades);
        let run = OptimizationRun::new(now, RunStatus::NoCandidate, trades.len()).with_metrics(metrics.clone());

        let Some(oracle) = self.ctx.oracle.as_ref() else {
            return OptimizationRun { status: RunStatus::OracleFailed, ..run }
                .with_message("no scoring oracle configured");
        };

        let request = OracleRequest { historical_data: trades, current_metrics: metrics };
        let response = match bounded(settings.oracle_timeout, "scoring oracle", oracle.optimize(&request)).await {
            Ok(response) => response,
            Err(e) => {
                return OptimizationRun { status: RunStatus::OracleFailed, ..run }.with_message(e.to_string());
            }
        };
        let run = run.with_oracle_result(&response);

        if response.best_params.is_empty() {
            return run.with_message("oracle returned no parameters");
        }

        let (config_b, ignored) = base.with_overlay(&response.best_params);
        if !ignored.is_empty() {
            warn!("Ignoring unknown optimizer parameters: {}", ignored.join(", "));
        }
        if let Err(e) = config_b.validate() {
            return OptimizationRun { status: RunStatus::Rejected, ..run }
                .with_message(format!("candidate configuration is invalid: {}", e));
        }

        let next = ConfigDocument::AbTest(AbTestConfig {
            ab_test_active: true,
            ab_test_start_time: now,
            ab_test_percentage: optimizer.ab_test_percentage,
            config_a: base.clone(),
            config_b,
        });

        let backup_key = match bounded(settings.store_timeout, "config backup", self.ctx.configs.save_backup(&next, now)).await
        {
            Ok(key) => key,
            Err(e) => {
                return OptimizationRun { status: RunStatus::StoreFailed, ..run }
                    .with_message(format!("failed to write configuration backup: {}", e));
            }
        };
        if let Err(e) = bounded(settings.store_timeout, "config save", self.ctx.configs.save_current(&next)).await {
            return OptimizationRun { status: RunStatus::StoreFailed, ..run }
                .with_backup_key(backup_key)
                .with_message(format!("failed to save configuration: {}", e));
        }

        OptimizationRun { status: RunStatus::Promoted, ..run }.with_backup_key(backup_key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::{ConfigStore, OptimizationLog};
    use crate::application::test_support::{closed_trades, Harness};
    use crate::domain::{AgentConfiguration, OracleResponse};
    use crate::ports::oracle::MockScoringOracle;
    use std::collections::BTreeMap;

    fn params(pairs: &[(&str, f64)]) -> BTreeMap<String, f64> {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    fn oracle_returning(best_params: BTreeMap<String, f64>) -> Arc<MockScoringOracle> {
        let mut oracle = MockScoringOracle::new();
        oracle
            .expect_optimize()
            .returning(move |_| Ok(OracleResponse { best_params: best_params.clone(), best_value: Some(1.2) }));
        Arc::new(oracle)
    }

    #[tokio::test]
    async fn test_insufficient_data_changes_nothing() {
        let harness = Harness::new();
        let now = Utc::now();
        harness.trades.seed(closed_trades(9, now)).await;

        let mut oracle = MockScoringOracle::new();
        oracle.expect_optimize().times(0);
        let optimizer = ParameterOptimizer::new(harness.ctx_with_oracle(Arc::new(oracle)));

        let run = optimizer.run_at(now).await.unwrap();
        assert_eq!(run.status, RunStatus::InsufficientData);
        assert_eq!(run.trades_considered, 9);
        assert!(harness.configs.load_current().await.unwrap().is_none());
        assert!(harness.configs.list_backups().await.unwrap().is_empty());
        assert_eq!(harness.optimizations.runs().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_promotes_ab_configuration() {
        let harness = Harness::new();
        let now = Utc::now();
        harness.trades.seed(closed_trades(12, now)).await;
        let oracle = oracle_returning(params(&[("quality_threshold", 70.0), ("high_score_sl", 0.08), ("bogus", 1.0)]));
        let optimizer = ParameterOptimizer::new(harness.ctx_with_oracle(oracle));

        let run = optimizer.run_at(now).await.unwrap();
        assert_eq!(run.status, RunStatus::Promoted);
        assert!(run.historical_metrics.is_some());
        assert_eq!(run.best_value, Some(1.2));

        let ConfigDocument::AbTest(test) = harness.configs.load_current().await.unwrap().unwrap() else {
            panic!("expected an A/B document");
        };
        assert!(test.ab_test_active);
        assert_eq!(test.ab_test_percentage, 0.15);
        assert_eq!(test.config_a, AgentConfiguration::default());
        assert_eq!(test.config_b.analyzer.quality_score_threshold, 70);
        assert_eq!(test.config_b.trader.high_score_sl, 0.08);

        let key = run.backup_key.unwrap();
        assert_eq!(harness.configs.load_backup(&key).await.unwrap(), ConfigDocument::AbTest(test));
    }

    #[tokio::test]
    async fn test_repeated_runs_are_idempotent() {
        let harness = Harness::new();
        let now = Utc::now();
        harness.trades.seed(closed_trades(12, now)).await;
        let oracle = oracle_returning(params(&[("medium_score_tp", 0.28)]));
        let optimizer = ParameterOptimizer::new(harness.ctx_with_oracle(oracle));

        let first = optimizer.run_at(now).await.unwrap();
        let first_doc = harness.configs.load_current().await.unwrap().unwrap();
        let second = optimizer.run_at(now + Duration::seconds(5)).await.unwrap();
        let second_doc = harness.configs.load_current().await.unwrap().unwrap();

        assert_eq!(first.best_params, second.best_params);
        assert_eq!(first.historical_metrics, second.historical_metrics);
        assert_ne!(first.backup_key, second.backup_key);

        // Only the start time moves; arm A stays the original base
        let (ConfigDocument::AbTest(a), ConfigDocument::AbTest(b)) = (first_doc, second_doc) else {
            panic!("expected A/B documents");
        };
        assert_eq!(a.config_a, b.config_a);
        assert_eq!(a.config_b, b.config_b);
        assert_ne!(a.ab_test_start_time, b.ab_test_start_time);
    }

    #[tokio::test]
    async fn test_oracle_failure_changes_nothing() {
        let harness = Harness::new();
        let now = Utc::now();
        harness.trades.seed(closed_trades(12, now)).await;
        let mut oracle = MockScoringOracle::new();
        oracle
            .expect_optimize()
            .times(1)
            .returning(|_| Err(PortError::Unavailable("connection refused".to_string())));
        let optimizer = ParameterOptimizer::new(harness.ctx_with_oracle(Arc::new(oracle)));

        let run = optimizer.run_at(now).await.unwrap();
        assert_eq!(run.status, RunStatus::OracleFailed);
        assert!(harness.configs.load_current().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_invalid_candidate_rejected() {
        let harness = Harness::new();
        let now = Utc::now();
        harness.trades.seed(closed_trades(12, now)).await;
        // high tier stop wider than the low tier
        let optimizer = ParameterOptimizer::new(harness.ctx_with_oracle(oracle_returning(params(&[("high_score_sl", 0.5)]))));

        let run = optimizer.run_at(now).await.unwrap();
        assert_eq!(run.status, RunStatus::Rejected);
        assert!(harness.configs.load_current().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_empty_candidate() {
        let harness = Harness::new();
        let now = Utc::now();
        harness.trades.seed(closed_trades(12, now)).await;
        let optimizer = ParameterOptimizer::new(harness.ctx_with_oracle(oracle_returning(BTreeMap::new())));

        assert_eq!(optimizer.run_at(now).await.unwrap().status, RunStatus::NoCandidate);
    }

    #[tokio::test]
    async fn test_failed_save_keeps_previous_document() {
        let harness = Harness::new();
        let now = Utc::now();
        harness.trades.seed(closed_trades(12, now)).await;
        harness.configs.fail_next_saves(1).await;
        let optimizer = ParameterOptimizer::new(harness.ctx_with_oracle(oracle_returning(params(&[("low_score_tp", 0.22)]))));

        let run = optimizer.run_at(now).await.unwrap();
        assert_eq!(run.status, RunStatus::StoreFailed);
        assert!(harness.configs.load_current().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_concurrent_run_refused() {
        let harness = Harness::new();
        let optimizer = ParameterOptimizer::new(harness.ctx());

        let _held = optimizer.run_lock.try_lock().unwrap();
        assert!(matches!(optimizer.run_at(Utc::now()).await, Err(OptimizerError::AlreadyRunning)));
    }

    #[tokio::test]
    async fn test_due_after_interval() {
        let harness = Harness::new();
        let now = Utc::now();
        let optimizer = ParameterOptimizer::new(harness.ctx());
        assert!(optimizer.is_due(now).await.unwrap());

        optimizer.run_at(now).await.unwrap();
        assert!(!optimizer.is_due(now + Duration::days(1)).await.unwrap());
        assert!(optimizer.is_due(now + Duration::weeks(1)).await.unwrap());
        assert!(optimizer.tick(now + Duration::hours(1)).await.unwrap().is_none());
    }
}
