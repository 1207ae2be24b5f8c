//! Position Monitor
//!
//! Polls every open trade, compares the current price against its stop-loss
//! and take-profit levels, and closes the trade once the sell has gone
//! through. A trade is only ever closed after a successful sell: a missing
//! price or a failed sell leaves it open for the next pass. A sell whose
//! close could not be stored is kept and the close retried; the position is
//! never sold twice.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use super::context::{bounded, PipelineContext};
use crate::domain::{CloseReason, ConfigDocument, Trade, TradeExit};
use crate::ports::{OrderRequest, PortError};

#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("Trade not found: {0}")]
    NotFound(String),
    #[error("Trade {0} is not open")]
    NotOpen(String),
    #[error("Trade {0} is already being closed")]
    InFlight(String),
    #[error("No price for {token_address}: {source}")]
    NoPrice { token_address: String, source: PortError },
    #[error("Sell of {token_address} failed: {source}")]
    SellFailed { token_address: String, source: PortError },
    /// The sell filled but the close could not be stored; the fill is kept
    /// and the close retried on the next pass without selling again
    #[error("Trade {trade_id} sold at {price} but not recorded: {source}")]
    Unrecorded { trade_id: String, price: f64, source: PortError },
    #[error("Port error: {0}")]
    Port(#[from] PortError),
}

/// What one check did to a trade
#[derive(Debug, Clone, PartialEq)]
pub enum MonitorAction {
    Hold { price: f64 },
    Closed(Trade),
    NoPrice,
    SellFailed,
    /// Sold, close still pending in the store
    Unrecorded,
    /// Another task is closing this trade
    Busy,
}

/// Counts for one monitoring pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MonitorSummary {
    pub checked: usize,
    pub closed: usize,
    pub held: usize,
    pub errors: usize,
}

/// Trade ids with an exit in progress
#[derive(Debug, Default)]
struct InFlight(Mutex<HashSet<String>>);

impl InFlight {
    fn claim(self: &Arc<Self>, trade_id: &str) -> Option<InFlightGuard> {
        let mut ids = self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if !ids.insert(trade_id.to_string()) {
            return None;
        }
        Some(InFlightGuard { owner: Arc::clone(self), trade_id: trade_id.to_string() })
    }
}

struct InFlightGuard {
    owner: Arc<InFlight>,
    trade_id: String,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        let mut ids = self.owner.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        ids.remove(&self.trade_id);
    }
}

pub struct PositionMonitor {
    ctx: Arc<PipelineContext>,
    in_flight: Arc<InFlight>,
    /// Fills whose close has not been stored yet, by trade id
    unrecorded: Mutex<HashMap<String, TradeExit>>,
}

impl PositionMonitor {
    pub fn new(ctx: Arc<PipelineContext>) -> Self {
        Self {
            ctx,
            in_flight: Arc::new(InFlight::default()),
            unrecorded: Mutex::new(HashMap::new()),
        }
    }

    /// Exit the given price triggers for `trade`, if any
    pub fn evaluate(trade: &Trade, price: f64) -> Option<CloseReason> {
        trade.exit_trigger(price)
    }

    /// Check every open trade once. Per-trade failures are logged and counted
    /// without stopping the pass.
    pub async fn run_pass(&self, now: DateTime<Utc>) -> Result<MonitorSummary, MonitorError> {
        let document = self.ctx.load_document().await?;
        let open = bounded(self.ctx.settings.store_timeout, "open trades", self.ctx.trades.open_trades()).await?;

        let mut summary = MonitorSummary::default();
        for trade in &open {
            summary.checked += 1;
            match self.check(trade, &document, now).await {
                Ok(MonitorAction::Closed(_)) => summary.closed += 1,
                Ok(MonitorAction::Hold { .. }) | Ok(MonitorAction::Busy) => summary.held += 1,
                Ok(MonitorAction::NoPrice) | Ok(MonitorAction::SellFailed) | Ok(MonitorAction::Unrecorded) => {
                    summary.errors += 1
                }
                Err(e) => {
                    error!("Monitoring {} failed: {}", trade.trade_id, e);
                    summary.errors += 1;
                }
            }
        }

        if summary.checked > 0 {
            info!(
                "Monitor pass: {} checked, {} closed, {} held, {} errors",
                summary.checked, summary.closed, summary.held, summary.errors
            );
        }
        Ok(summary)
    }

    /// Check one open trade against the current price
    pub async fn check(
        &self,
        trade: &Trade,
        document: &ConfigDocument,
        now: DateTime<Utc>,
    ) -> Result<MonitorAction, MonitorError> {
        if let Some(pending) = self.pending_exit(&trade.trade_id) {
            return self.settle(self.exit(trade, pending.reason, pending.price, document, now).await);
        }

        let price = match self.price(&trade.token_address).await {
            Ok(price) => price,
            Err(e) => {
                warn!("{}", e);
                return Ok(MonitorAction::NoPrice);
            }
        };

        let Some(reason) = Self::evaluate(trade, price) else {
            return Ok(MonitorAction::Hold { price });
        };

        info!(
            "{} hit {} at {:.8} (entry {:.8})",
            trade.trade_id, reason, price, trade.entry_price
        );
        self.settle(self.exit(trade, reason, price, document, now).await)
    }

    fn settle(&self, result: Result<Option<Trade>, MonitorError>) -> Result<MonitorAction, MonitorError> {
        match result {
            Ok(Some(closed)) => Ok(MonitorAction::Closed(closed)),
            Ok(None) => Ok(MonitorAction::Busy),
            Err(MonitorError::SellFailed { token_address, source }) => {
                error!("Sell of {} failed, trade stays open: {}", token_address, source);
                Ok(MonitorAction::SellFailed)
            }
            Err(MonitorError::Unrecorded { .. }) => Ok(MonitorAction::Unrecorded),
            Err(MonitorError::InFlight(_)) => Ok(MonitorAction::Busy),
            Err(e) => Err(e),
        }
    }

    fn pending_exit(&self, trade_id: &str) -> Option<TradeExit> {
        let pending = self.unrecorded.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        pending.get(trade_id).copied()
    }

    /// Close an open trade at the current price, with reason `manual`
    pub async fn close_manual(&self, trade_id: &str, now: DateTime<Utc>) -> Result<Trade, MonitorError> {
        let trade = bounded(self.ctx.settings.store_timeout, "trade lookup", self.ctx.trades.get(trade_id))
            .await?
            .ok_or_else(|| MonitorError::NotFound(trade_id.to_string()))?;
        if !trade.is_open() {
            return Err(MonitorError::NotOpen(trade_id.to_string()));
        }

        let document = self.ctx.load_document().await?;
        if let Some(pending) = self.pending_exit(trade_id) {
            return self
                .exit(&trade, pending.reason, pending.price, &document, now)
                .await?
                .ok_or_else(|| MonitorError::NotOpen(trade_id.to_string()));
        }
        let price = self.price(&trade.token_address).await?;
        self.exit(&trade, CloseReason::Manual, price, &document, now)
            .await?
            .ok_or_else(|| MonitorError::NotOpen(trade_id.to_string()))
    }

    async fn price(&self, token_address: &str) -> Result<f64, MonitorError> {
        let price = bounded(
            self.ctx.settings.price_timeout,
            "price lookup",
            self.ctx.prices.price_usd(token_address),
        )
        .await
        .map_err(|source| MonitorError::NoPrice { token_address: token_address.to_string(), source })?;

        if !price.is_finite() || price <= 0.0 {
            return Err(MonitorError::NoPrice {
                token_address: token_address.to_string(),
                source: PortError::Serialization(format!("unusable price {}", price)),
            });
        }
        Ok(price)
    }

    /// Sell, then mark the trade closed. `Ok(None)` means someone else closed
    /// it first. A trade with a stored-but-unrecorded fill is not sold again;
    /// only its close is retried.
    async fn exit(
        &self,
        trade: &Trade,
        reason: CloseReason,
        price: f64,
        document: &ConfigDocument,
        now: DateTime<Utc>,
    ) -> Result<Option<Trade>, MonitorError> {
        let _guard = self
            .in_flight
            .claim(&trade.trade_id)
            .ok_or_else(|| MonitorError::InFlight(trade.trade_id.clone()))?;

        let exit = match self.pending_exit(&trade.trade_id) {
            Some(pending) => {
                info!("Retrying close of {} with its earlier fill @ {:.8}", trade.trade_id, pending.price);
                pending
            }
            None => {
                // Current value of the position
                let amount_usd = trade.amount_usd * price / trade.entry_price;
                let max_slippage = document.for_arm(trade.arm).trader.max_slippage;
                let order = OrderRequest::new(trade.token_address.as_str(), amount_usd, price, max_slippage);

                let fill = bounded(self.ctx.settings.execution_timeout, "sell", self.ctx.execution.sell(&order))
                    .await
                    .map_err(|source| MonitorError::SellFailed { token_address: trade.token_address.clone(), source })?;
                debug!("Sold {} @ {:.8} ({})", trade.trade_id, fill.price, fill.signature);
                TradeExit { price: fill.price, time: now, reason }
            }
        };

        let closed = match bounded(
            self.ctx.settings.store_timeout,
            "trade close",
            self.ctx.trades.close(&trade.trade_id, exit),
        )
        .await
        {
            Ok(closed) => closed,
            Err(source) => {
                error!(
                    "{} sold @ {:.8} but the close was not stored, will retry without selling: {}",
                    trade.trade_id, exit.price, source
                );
                self.unrecorded
                    .lock()
                    .unwrap_or_else(|poisoned| poisoned.into_inner())
                    .insert(trade.trade_id.clone(), exit);
                return Err(MonitorError::Unrecorded { trade_id: trade.trade_id.clone(), price: exit.price, source });
            }
        };
        self.unrecorded
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(&trade.trade_id);

        match &closed {
            Some(closed) => info!(
                "Closed {} ({}) @ {:.8}: P&L ${:.2} [{}]",
                closed.trade_id,
                closed.token_address,
                exit.price,
                closed.pnl.unwrap_or_default(),
                exit.reason
            ),
            None => warn!("{} was already closed when the sell completed", trade.trade_id),
        }
        Ok(closed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::mocks::{InMemoryTradeStore, OrderSide};
    use crate::ports::TradeStore;
    use crate::application::test_support::{open_trade, Harness};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use approx::assert_relative_eq;
    use chrono::Duration;

    #[tokio::test]
    async fn test_stop_loss_boundary() {
        let harness = Harness::new();
        let now = Utc::now();
        let trade = open_trade("t1", "mint", now - Duration::hours(1));
        harness.trades.seed(vec![trade.clone()]).await;
        let monitor = PositionMonitor::new(harness.ctx());
        let document = ConfigDocument::default();

        harness.prices.set_price("mint", 0.91).await;
        assert_eq!(monitor.check(&trade, &document, now).await.unwrap(), MonitorAction::Hold { price: 0.91 });

        harness.prices.set_price("mint", 0.90).await;
        let MonitorAction::Closed(closed) = monitor.check(&trade, &document, now).await.unwrap() else {
            panic!("expected the stop-loss to close the trade");
        };
        assert_eq!(closed.close_reason, Some(CloseReason::StopLoss));
        assert_relative_eq!(closed.pnl.unwrap(), -10.0, epsilon = 1e-9);
    }

    #[tokio::test]
    async fn test_take_profit() {
        let harness = Harness::new();
        let now = Utc::now();
        harness.trades.seed(vec![open_trade("t1", "mint", now - Duration::hours(1))]).await;
        harness.prices.set_price("mint", 1.30).await;
        let monitor = PositionMonitor::new(harness.ctx());

        let summary = monitor.run_pass(now).await.unwrap();
        assert_eq!(summary, MonitorSummary { checked: 1, closed: 1, held: 0, errors: 0 });

        let closed = harness.trades.get("t1").await.unwrap().unwrap();
        assert_eq!(closed.close_reason, Some(CloseReason::TakeProfit));
    }

    #[tokio::test]
    async fn test_missing_price_holds() {
        let harness = Harness::new();
        let now = Utc::now();
        harness.trades.seed(vec![open_trade("t1", "mint", now)]).await;
        let monitor = PositionMonitor::new(harness.ctx());

        let summary = monitor.run_pass(now).await.unwrap();
        assert_eq!(summary.errors, 1);
        assert!(harness.trades.get("t1").await.unwrap().unwrap().is_open());
        assert!(harness.execution.get_calls().await.is_empty());
    }

    #[test]
    fn test_price_timeout_holds() {
        let harness = Harness::new();
        let now = Utc::now();
        let trade = open_trade("t1", "mint", now);

        let mut prices = crate::ports::market::MockPriceOracle::new();
        prices
            .expect_price_usd()
            .times(1)
            .returning(|_| Err(PortError::Timeout("price".to_string())));
        let mut ctx = (*harness.ctx()).clone();
        ctx.prices = Arc::new(prices);
        let monitor = PositionMonitor::new(Arc::new(ctx));

        let action = tokio_test::block_on(monitor.check(&trade, &ConfigDocument::default(), now)).unwrap();
        assert_eq!(action, MonitorAction::NoPrice);
    }

    #[tokio::test]
    async fn test_failed_sell_leaves_trade_open() {
        let harness = Harness::new();
        let now = Utc::now();
        harness.trades.seed(vec![open_trade("t1", "mint", now - Duration::hours(1))]).await;
        harness.prices.set_price("mint", 0.5).await;
        harness.execution.fail_sells_for("mint").await;
        let monitor = PositionMonitor::new(harness.ctx());

        let summary = monitor.run_pass(now).await.unwrap();
        assert_eq!(summary.errors, 1);
        let trade = harness.trades.get("t1").await.unwrap().unwrap();
        assert!(trade.is_open());
        assert!(trade.pnl.is_none());

        // Next pass succeeds once the venue recovers
        harness.execution.clear_failures().await;
        assert_eq!(monitor.run_pass(now).await.unwrap().closed, 1);
    }

    #[tokio::test]
    async fn test_manual_close() {
        let harness = Harness::new();
        let now = Utc::now();
        harness.trades.seed(vec![open_trade("t1", "mint", now - Duration::hours(2))]).await;
        harness.prices.set_price("mint", 1.05).await;
        let monitor = PositionMonitor::new(harness.ctx());

        let closed = monitor.close_manual("t1", now).await.unwrap();
        assert_eq!(closed.close_reason, Some(CloseReason::Manual));
        assert_relative_eq!(closed.pnl.unwrap(), 5.0, epsilon = 1e-9);

        assert!(matches!(monitor.close_manual("t1", now).await, Err(MonitorError::NotOpen(_))));
        assert!(matches!(monitor.close_manual("nope", now).await, Err(MonitorError::NotFound(_))));
    }

    /// Trade store whose next `close` calls fail
    #[derive(Clone)]
    struct FlakyCloseStore {
        inner: InMemoryTradeStore,
        failing_closes: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl TradeStore for FlakyCloseStore {
        async fn insert_open(&self, trade: Trade) -> Result<bool, PortError> {
            self.inner.insert_open(trade).await
        }

        async fn open_trades(&self) -> Result<Vec<Trade>, PortError> {
            self.inner.open_trades().await
        }

        async fn has_open_trade(&self, token_address: &str) -> Result<bool, PortError> {
            self.inner.has_open_trade(token_address).await
        }

        async fn close(&self, trade_id: &str, exit: TradeExit) -> Result<Option<Trade>, PortError> {
            let failing = self.failing_closes.load(Ordering::SeqCst);
            if failing > 0 {
                self.failing_closes.store(failing - 1, Ordering::SeqCst);
                return Err(PortError::Unavailable("trade store offline".to_string()));
            }
            self.inner.close(trade_id, exit).await
        }

        async fn get(&self, trade_id: &str) -> Result<Option<Trade>, PortError> {
            self.inner.get(trade_id).await
        }

        async fn trades_since(&self, since: DateTime<Utc>) -> Result<Vec<Trade>, PortError> {
            self.inner.trades_since(since).await
        }
    }

    #[tokio::test]
    async fn test_unrecorded_close_is_retried_without_selling_again() {
        let harness = Harness::new();
        let now = Utc::now();
        harness.trades.seed(vec![open_trade("t1", "mint", now - Duration::hours(1))]).await;
        harness.prices.set_price("mint", 1.30).await;

        let store = FlakyCloseStore { inner: harness.trades.clone(), failing_closes: Arc::new(AtomicUsize::new(1)) };
        let mut ctx = (*harness.ctx()).clone();
        ctx.trades = Arc::new(store);
        let monitor = PositionMonitor::new(Arc::new(ctx));

        let first = monitor.run_pass(now).await.unwrap();
        assert_eq!(first, MonitorSummary { checked: 1, closed: 0, held: 0, errors: 1 });
        assert!(harness.trades.get("t1").await.unwrap().unwrap().is_open());

        // The price falls back under the target; the earlier fill still closes it
        harness.prices.set_price("mint", 1.0).await;
        let second = monitor.run_pass(now + Duration::seconds(30)).await.unwrap();
        assert_eq!(second, MonitorSummary { checked: 1, closed: 1, held: 0, errors: 0 });

        let sells: Vec<_> = harness
            .execution
            .get_calls()
            .await
            .into_iter()
            .filter(|(side, _)| *side == OrderSide::Sell)
            .collect();
        assert_eq!(sells.len(), 1);

        let closed = harness.trades.get("t1").await.unwrap().unwrap();
        assert_eq!(closed.close_reason, Some(CloseReason::TakeProfit));
        assert_relative_eq!(closed.exit_price.unwrap(), 1.30, epsilon = 1e-9);
        assert_relative_eq!(closed.pnl.unwrap(), 30.0, epsilon = 1e-9);
        assert_eq!(closed.exit_time, Some(now));
    }

    #[tokio::test]
    async fn test_manual_close_uses_unrecorded_fill() {
        let harness = Harness::new();
        let now = Utc::now();
        harness.trades.seed(vec![open_trade("t1", "mint", now - Duration::hours(1))]).await;
        harness.prices.set_price("mint", 0.80).await;

        let store = FlakyCloseStore { inner: harness.trades.clone(), failing_closes: Arc::new(AtomicUsize::new(1)) };
        let mut ctx = (*harness.ctx()).clone();
        ctx.trades = Arc::new(store);
        let monitor = PositionMonitor::new(Arc::new(ctx));

        assert_eq!(monitor.run_pass(now).await.unwrap().errors, 1);
        let closed = monitor.close_manual("t1", now).await.unwrap();
        assert_eq!(closed.close_reason, Some(CloseReason::StopLoss));
        assert_eq!(harness.execution.get_calls().await.len(), 1);
    }

    #[test]
    fn test_in_flight_claims_are_exclusive() {
        let in_flight = Arc::new(InFlight::default());
        let guard = in_flight.claim("t1");
        assert!(guard.is_some());
        assert!(in_flight.claim("t1").is_none());
        drop(guard);
        assert!(in_flight.claim("t1").is_some());
    }
}
