//! Application Layer - Pipeline stages over the ports
//!
//! - `analyzer`: candidates -> composite analyses -> trade decisions
//! - `trader`: decisions -> sized, mitigated buys -> open trades
//! - `monitor`: open trades -> stop-loss / take-profit / manual exits
//! - `optimizer`: closed trades -> oracle -> A/B configuration rollout
//! - `pipeline`: runs the stages on their schedules

pub mod analyzer;
pub mod context;
pub mod monitor;
pub mod optimizer;
pub mod pipeline;
pub mod trader;

pub use analyzer::{AnalyzeSummary, Analyzer, AnalyzerError};
pub use context::{bounded, PipelineContext, PipelineSettings};
pub use monitor::{MonitorAction, MonitorError, MonitorSummary, PositionMonitor};
pub use optimizer::{OptimizerError, ParameterOptimizer};
pub use pipeline::{CycleReport, Pipeline, PipelineError, Schedule};
pub use trader::{SkipReason, TradeOutcome, TradeSummary, Trader, TraderError};

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use chrono::{DateTime, Duration, Utc};
    use serde_json::Value;

    use super::context::{PipelineContext, PipelineSettings};
    use crate::adapters::queue::InProcessQueue;
    use crate::domain::{
        CloseReason, ConfigArm, ConfigDocument, MetricBundle, PoolSnapshot, SocialMetrics, TokenCandidate, Trade,
        TradeDecision, TradeExit, TradeParameterizer, Venue,
    };
    use crate::domain::{Confidence, Recommendation};
    use crate::ports::mocks::{
        InMemoryAnalysisStore, InMemoryConfigStore, InMemoryOptimizationLog, InMemoryTradeStore, MockExecution,
        MockPriceOracle,
    };
    use crate::ports::{ConfigStore, ScoringOracle};

    /// In-memory ports with handles kept for assertions
    pub struct Harness {
        pub queue: InProcessQueue,
        pub trades: InMemoryTradeStore,
        pub analyses: InMemoryAnalysisStore,
        pub configs: Arc<InMemoryConfigStore>,
        pub optimizations: InMemoryOptimizationLog,
        pub prices: MockPriceOracle,
        pub execution: MockExecution,
    }

    impl Harness {
        pub fn new() -> Self {
            Self {
                queue: InProcessQueue::new(),
                trades: InMemoryTradeStore::new(),
                analyses: InMemoryAnalysisStore::new(),
                configs: Arc::new(InMemoryConfigStore::new()),
                optimizations: InMemoryOptimizationLog::new(),
                prices: MockPriceOracle::new(),
                execution: MockExecution::new(),
            }
        }

        pub async fn with_document(self, document: ConfigDocument) -> Self {
            self.configs.save_current(&document).await.unwrap();
            self
        }

        fn context(&self, oracle: Option<Arc<dyn ScoringOracle>>) -> Arc<PipelineContext> {
            Arc::new(PipelineContext {
                queue: Arc::new(self.queue.clone()),
                trades: Arc::new(self.trades.clone()),
                analyses: Arc::new(self.analyses.clone()),
                configs: self.configs.clone(),
                optimizations: Arc::new(self.optimizations.clone()),
                prices: Arc::new(self.prices.clone()),
                execution: Arc::new(self.execution.clone()),
                oracle,
                settings: PipelineSettings::default(),
            })
        }

        pub fn ctx(&self) -> Arc<PipelineContext> {
            self.context(None)
        }

        pub fn ctx_with_oracle(&self, oracle: Arc<dyn ScoringOracle>) -> Arc<PipelineContext> {
            self.context(Some(oracle))
        }
    }

    /// Candidate that maxes every pumpswap dimension at `now`
    pub fn strong_candidate(address: &str, now: DateTime<Utc>) -> Value {
        let metrics = MetricBundle {
            pool: Some(PoolSnapshot {
                liquidity_usd: 20_000.0,
                volume_24h_usd: 10_000.0,
                price_usd: 0.01,
                price_change_24h: -0.05,
            }),
            total_volume_usd: Some(60_000.0),
            trade_count: Some(25),
            social: Some(SocialMetrics { twitter_mentions: 150, telegram_activity: 40, discord_activity: 12 }),
            ..MetricBundle::default()
        };
        let candidate = TokenCandidate::new(address, Venue::PumpSwap, now)
            .with_migrated_at(now - Duration::minutes(30))
            .with_metrics(metrics);
        serde_json::to_value(candidate).unwrap()
    }

    pub fn decision(address: &str, quality_score: u32) -> TradeDecision {
        TradeDecision {
            token_address: address.to_string(),
            overall_score: quality_score as f64 / 100.0,
            quality_score,
            recommendation: if quality_score >= 80 { Recommendation::StrongBuy } else { Recommendation::Buy },
            confidence: Confidence::Medium,
            risk_factors: Vec::new(),
            opportunity_factors: Vec::new(),
            trade_parameters: TradeParameterizer::default().parameters(quality_score),
            arm: ConfigArm::A,
            decided_at: Utc::now(),
        }
    }

    /// Open trade at entry 1.0, $100, SL 10% / TP 30%
    pub fn open_trade(id: &str, address: &str, entry_time: DateTime<Utc>) -> Trade {
        Trade::open(id, address, 1.0, 100.0, TradeParameterizer::default().parameters(85), entry_time)
    }

    /// `count` closed trades over the last days before `now`, alternating wins and losses
    pub fn closed_trades(count: usize, now: DateTime<Utc>) -> Vec<Trade> {
        (0..count)
            .map(|i| {
                let entry = now - Duration::hours(48) + Duration::hours(i as i64);
                let mut trade = open_trade(&format!("hist_{}", i), &format!("mint_{}", i), entry);
                let (price, reason) = if i % 2 == 0 { (1.3, CloseReason::TakeProfit) } else { (0.9, CloseReason::StopLoss) };
                trade
                    .close(TradeExit { price, time: entry + Duration::minutes(30), reason })
                    .unwrap();
                trade
            })
            .collect()
    }
}
