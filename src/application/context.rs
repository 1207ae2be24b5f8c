//! Pipeline Context
//!
//! Everything a stage needs, injected once at startup: the capability ports
//! and the runtime limits from `sniper.toml`.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::domain::ConfigDocument;
use crate::ports::{
    AnalysisStore, ConfigStore, ExecutionPort, MessageQueue, OptimizationLog, PortError, PriceOracle,
    ScoringOracle, TradeStore,
};
use crate::scoring::composite::DEFAULT_SCORER_TIMEOUT;

/// Runtime limits shared by all stages
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineSettings {
    pub capital_usd: f64,
    pub batch_size: usize,
    pub max_delivery_attempts: u32,
    pub scorer_timeout: Duration,
    pub price_timeout: Duration,
    pub execution_timeout: Duration,
    pub oracle_timeout: Duration,
    pub store_timeout: Duration,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            capital_usd: 1000.0,
            batch_size: 50,
            max_delivery_attempts: 3,
            scorer_timeout: DEFAULT_SCORER_TIMEOUT,
            price_timeout: Duration::from_secs(10),
            execution_timeout: Duration::from_secs(30),
            oracle_timeout: Duration::from_secs(120),
            store_timeout: Duration::from_secs(10),
        }
    }
}

impl PipelineSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            capital_usd: config.trading.capital_usd,
            batch_size: config.pipeline.batch_size,
            max_delivery_attempts: config.pipeline.max_delivery_attempts,
            scorer_timeout: config.timeouts.scorer(),
            price_timeout: config.timeouts.price(),
            execution_timeout: config.timeouts.execution(),
            oracle_timeout: config.timeouts.oracle(),
            store_timeout: config.timeouts.store(),
        }
    }
}

/// Ports and settings for one pipeline instance
#[derive(Clone)]
pub struct PipelineContext {
    pub queue: Arc<dyn MessageQueue>,
    pub trades: Arc<dyn TradeStore>,
    pub analyses: Arc<dyn AnalysisStore>,
    pub configs: Arc<dyn ConfigStore>,
    pub optimizations: Arc<dyn OptimizationLog>,
    pub prices: Arc<dyn PriceOracle>,
    pub execution: Arc<dyn ExecutionPort>,
    /// `None` when no oracle endpoint is configured
    pub oracle: Option<Arc<dyn ScoringOracle>>,
    pub settings: PipelineSettings,
}

impl std::fmt::Debug for PipelineContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineContext")
            .field("oracle", &self.oracle.is_some())
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl PipelineContext {
    /// Current configuration document, or the defaults when none is stored
    pub async fn load_document(&self) -> Result<ConfigDocument, PortError> {
        let stored = bounded(self.settings.store_timeout, "config load", self.configs.load_current()).await?;
        Ok(stored.unwrap_or_default())
    }
}

/// Await a port call, failing with `PortError::Timeout` after `limit`
pub async fn bounded<T, F>(limit: Duration, what: &str, call: F) -> Result<T, PortError>
where
    F: Future<Output = Result<T, PortError>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(PortError::Timeout(format!("{} exceeded {:?}", what, limit))),
    }
}
