//! In-memory port implementations
//!
//! Used by tests and dry runs. Each records what it was asked to do and
//! allows controlled responses through `with_*` builders.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use super::{
    backup_key, AnalysisStore, ConfigStore, ExecutionPort, Fill, OptimizationLog, OrderRequest, PortError,
    PriceOracle, ScoringOracle, SecretStore, TradeStore,
};
use crate::domain::{
    CompositeAnalysis, ConfigDocument, OptimizationRun, OracleRequest, OracleResponse, Trade, TradeExit,
};

/// Trade store backed by a vector, in insertion order
#[derive(Debug, Default, Clone)]
pub struct InMemoryTradeStore {
    trades: Arc<Mutex<Vec<Trade>>>,
}

impl InMemoryTradeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed with existing trades (open or closed) without the open-trade check
    pub async fn seed(&self, trades: Vec<Trade>) {
        self.trades.lock().await.extend(trades);
    }

    pub async fn all(&self) -> Vec<Trade> {
        self.trades.lock().await.clone()
    }
}

#[async_trait]
impl TradeStore for InMemoryTradeStore {
    async fn insert_open(&self, trade: Trade) -> Result<bool, PortError> {
        let mut trades = self.trades.lock().await;
        if trades.iter().any(|t| t.trade_id == trade.trade_id) {
            return Err(PortError::Conflict(format!("trade {} already exists", trade.trade_id)));
        }
        if trades.iter().any(|t| t.is_open() && t.token_address == trade.token_address) {
            return Ok(false);
        }
        trades.push(trade);
        Ok(true)
    }

    async fn open_trades(&self) -> Result<Vec<Trade>, PortError> {
        Ok(self.trades.lock().await.iter().filter(|t| t.is_open()).cloned().collect())
    }

    async fn has_open_trade(&self, token_address: &str) -> Result<bool, PortError> {
        Ok(self
            .trades
            .lock()
            .await
            .iter()
            .any(|t| t.is_open() && t.token_address == token_address))
    }

    async fn close(&self, trade_id: &str, exit: TradeExit) -> Result<Option<Trade>, PortError> {
        let mut trades = self.trades.lock().await;
        let Some(trade) = trades.iter_mut().find(|t| t.trade_id == trade_id) else {
            return Ok(None);
        };
        if !trade.is_open() {
            return Ok(None);
        }
        trade.close(exit).map_err(|e| PortError::Rejected(e.to_string()))?;
        Ok(Some(trade.clone()))
    }

    async fn get(&self, trade_id: &str) -> Result<Option<Trade>, PortError> {
        Ok(self.trades.lock().await.iter().find(|t| t.trade_id == trade_id).cloned())
    }

    async fn trades_since(&self, since: DateTime<Utc>) -> Result<Vec<Trade>, PortError> {
        let mut trades: Vec<Trade> = self
            .trades
            .lock()
            .await
            .iter()
            .filter(|t| t.entry_time >= since)
            .cloned()
            .collect();
        trades.sort_by_key(|t| t.entry_time);
        Ok(trades)
    }
}

#[derive(Debug, Default, Clone)]
pub struct InMemoryAnalysisStore {
    analyses: Arc<Mutex<Vec<CompositeAnalysis>>>,
}

impl InMemoryAnalysisStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn all(&self) -> Vec<CompositeAnalysis> {
        self.analyses.lock().await.clone()
    }
}

#[async_trait]
impl AnalysisStore for InMemoryAnalysisStore {
    async fn record(&self, analysis: &CompositeAnalysis) -> Result<(), PortError> {
        self.analyses.lock().await.push(analysis.clone());
        Ok(())
    }

    async fn recent(&self, limit: usize) -> Result<Vec<CompositeAnalysis>, PortError> {
        let analyses = self.analyses.lock().await;
        let skip = analyses.len().saturating_sub(limit);
        Ok(analyses.iter().skip(skip).cloned().collect())
    }
}

#[derive(Debug, Default)]
struct ConfigState {
    current: Option<ConfigDocument>,
    backups: BTreeMap<String, ConfigDocument>,
    save_failures: usize,
}

/// Config store holding the current document and backups in memory
#[derive(Debug, Default, Clone)]
pub struct InMemoryConfigStore {
    state: Arc<Mutex<ConfigState>>,
}

impl InMemoryConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn with_current(self, document: ConfigDocument) -> Self {
        self.state.lock().await.current = Some(document);
        self
    }

    /// Fail the next `count` calls to `save_current`
    pub async fn fail_next_saves(&self, count: usize) {
        self.state.lock().await.save_failures = count;
    }
}

#[async_trait]
impl ConfigStore for InMemoryConfigStore {
    async fn load_current(&self) -> Result<Option<ConfigDocument>, PortError> {
        Ok(self.state.lock().await.current.clone())
    }

    async fn save_current(&self, document: &ConfigDocument) -> Result<(), PortError> {
        let mut state = self.state.lock().await;
        if state.save_failures > 0 {
            state.save_failures -= 1;
            return Err(PortError::Unavailable("config store offline".to_string()));
        }
        state.current = Some(document.clone());
        Ok(())
    }

    async fn save_backup(&self, document: &ConfigDocument, at: DateTime<Utc>) -> Result<String, PortError> {
        let mut state = self.state.lock().await;
        let existing: Vec<String> = state.backups.keys().cloned().collect();
        let key = backup_key(at, &existing);
        state.backups.insert(key.clone(), document.clone());
        Ok(key)
    }

    async fn list_backups(&self) -> Result<Vec<String>, PortError> {
        Ok(self.state.lock().await.backups.keys().cloned().collect())
    }

    async fn load_backup(&self, key: &str) -> Result<ConfigDocument, PortError> {
        self.state
            .lock()
            .await
            .backups
            .get(key)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("backup {}", key)))
    }
}

#[derive(Debug, Default, Clone)]
pub struct InMemoryOptimizationLog {
    runs: Arc<Mutex<Vec<OptimizationRun>>>,
}

impl InMemoryOptimizationLog {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OptimizationLog for InMemoryOptimizationLog {
    async fn append(&self, run: &OptimizationRun) -> Result<(), PortError> {
        self.runs.lock().await.push(run.clone());
        Ok(())
    }

    async fn runs(&self) -> Result<Vec<OptimizationRun>, PortError> {
        Ok(self.runs.lock().await.clone())
    }
}

/// Price source with fixed quotes per token
#[derive(Debug, Default, Clone)]
pub struct MockPriceOracle {
    prices: Arc<Mutex<HashMap<String, f64>>>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl MockPriceOracle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to set the quote for a token
    pub async fn with_price(self, token_address: &str, price: f64) -> Self {
        self.set_price(token_address, price).await;
        self
    }

    pub async fn set_price(&self, token_address: &str, price: f64) {
        self.prices.lock().await.insert(token_address.to_string(), price);
    }

    pub async fn clear_price(&self, token_address: &str) {
        self.prices.lock().await.remove(token_address);
    }

    /// Get all recorded calls
    pub async fn get_calls(&self) -> Vec<String> {
        self.calls.lock().await.clone()
    }
}

#[async_trait]
impl PriceOracle for MockPriceOracle {
    async fn price_usd(&self, token_address: &str) -> Result<f64, PortError> {
        self.calls.lock().await.push(token_address.to_string());
        self.prices
            .lock()
            .await
            .get(token_address)
            .copied()
            .ok_or_else(|| PortError::NotFound(format!("no price for {}", token_address)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderSide {
    Buy,
    Sell,
}

/// Execution that fills every order at its reference price unless told to fail
#[derive(Debug, Default, Clone)]
pub struct MockExecution {
    calls: Arc<Mutex<Vec<(OrderSide, OrderRequest)>>>,
    failing_sells: Arc<Mutex<HashSet<String>>>,
    fail_buys: Arc<Mutex<bool>>,
}

impl MockExecution {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject every sell of this token until cleared
    pub async fn fail_sells_for(&self, token_address: &str) {
        self.failing_sells.lock().await.insert(token_address.to_string());
    }

    pub async fn clear_failures(&self) {
        self.failing_sells.lock().await.clear();
        *self.fail_buys.lock().await = false;
    }

    pub async fn fail_buys(&self) {
        *self.fail_buys.lock().await = true;
    }

    /// Get all recorded calls
    pub async fn get_calls(&self) -> Vec<(OrderSide, OrderRequest)> {
        self.calls.lock().await.clone()
    }

    async fn fill(&self, side: OrderSide, order: &OrderRequest) -> Fill {
        let mut calls = self.calls.lock().await;
        calls.push((side, order.clone()));
        Fill {
            signature: format!("mock-{:?}-{}", side, calls.len()).to_lowercase(),
            price: order.reference_price,
            amount_usd: order.amount_usd,
        }
    }
}

#[async_trait]
impl ExecutionPort for MockExecution {
    async fn buy(&self, order: &OrderRequest) -> Result<Fill, PortError> {
        if *self.fail_buys.lock().await {
            self.calls.lock().await.push((OrderSide::Buy, order.clone()));
            return Err(PortError::Rejected("buy rejected".to_string()));
        }
        Ok(self.fill(OrderSide::Buy, order).await)
    }

    async fn sell(&self, order: &OrderRequest) -> Result<Fill, PortError> {
        if self.failing_sells.lock().await.contains(&order.token_address) {
            self.calls.lock().await.push((OrderSide::Sell, order.clone()));
            return Err(PortError::Unavailable(format!("sell of {} failed", order.token_address)));
        }
        Ok(self.fill(OrderSide::Sell, order).await)
    }
}

/// Oracle returning a fixed response (or failure) and recording requests
#[derive(Debug, Clone)]
pub struct MockScoringOracle {
    response: Arc<Mutex<Result<OracleResponse, PortError>>>,
    requests: Arc<Mutex<Vec<OracleRequest>>>,
}

impl Default for MockScoringOracle {
    fn default() -> Self {
        Self {
            response: Arc::new(Mutex::new(Ok(OracleResponse::default()))),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl MockScoringOracle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to set the response for every call
    pub fn with_response(self, response: Result<OracleResponse, PortError>) -> Self {
        Self {
            response: Arc::new(Mutex::new(response)),
            requests: self.requests,
        }
    }

    pub async fn requests(&self) -> Vec<OracleRequest> {
        self.requests.lock().await.clone()
    }
}

#[async_trait]
impl ScoringOracle for MockScoringOracle {
    async fn optimize(&self, request: &OracleRequest) -> Result<OracleResponse, PortError> {
        self.requests.lock().await.push(request.clone());
        self.response.lock().await.clone()
    }
}

/// Secrets from a fixed map
#[derive(Debug, Default, Clone)]
pub struct StaticSecretStore {
    secrets: HashMap<String, String>,
}

impl StaticSecretStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_secret(mut self, name: &str, value: &str) -> Self {
        self.secrets.insert(name.to_string(), value.to_string());
        self
    }
}

impl SecretStore for StaticSecretStore {
    fn secret(&self, name: &str) -> Option<String> {
        self.secrets.get(name).cloned()
    }
}
