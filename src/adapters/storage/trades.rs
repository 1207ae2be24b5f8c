//! Trade store persisted as one JSON array. The file is loaded once and kept
//! in memory; every mutation rewrites it atomically before returning.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use super::{read_optional, write_atomic};
use crate::domain::{Trade, TradeExit};
use crate::ports::{PortError, TradeStore};

#[derive(Debug, Clone)]
pub struct JsonTradeStore {
    path: PathBuf,
    // None until first access
    cache: Arc<Mutex<Option<Vec<Trade>>>>,
}

impl JsonTradeStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cache: Arc::new(Mutex::new(None)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(path: &Path) -> Result<Vec<Trade>, PortError> {
        let Some(content) = read_optional(path).await? else {
            return Ok(Vec::new());
        };
        let trades: Vec<Trade> = serde_json::from_str(&content).map_err(|e| {
            PortError::Serialization(format!("trade file {} is corrupted: {}", path.display(), e))
        })?;
        tracing::info!(
            "Loaded {} trades ({} open) from {}",
            trades.len(),
            trades.iter().filter(|t| t.is_open()).count(),
            path.display()
        );
        Ok(trades)
    }

    async fn persist(&self, trades: &[Trade]) -> Result<(), PortError> {
        let content = serde_json::to_vec_pretty(trades)?;
        write_atomic(&self.path, &content).await
    }

    /// Run `f` against the loaded trades while holding the lock
    async fn with_trades<R>(&self, f: impl FnOnce(&[Trade]) -> R) -> Result<R, PortError> {
        let mut cache = self.cache.lock().await;
        if cache.is_none() {
            *cache = Some(Self::load(&self.path).await?);
        }
        Ok(f(cache.as_deref().unwrap_or_default()))
    }
}

#[async_trait]
impl TradeStore for JsonTradeStore {
    async fn insert_open(&self, trade: Trade) -> Result<bool, PortError> {
        let mut cache = self.cache.lock().await;
        let mut trades = match cache.take() {
            Some(trades) => trades,
            None => Self::load(&self.path).await?,
        };

        if trades.iter().any(|t| t.trade_id == trade.trade_id) {
            *cache = Some(trades);
            return Err(PortError::Conflict(format!("trade {} already exists", trade.trade_id)));
        }
        if trades.iter().any(|t| t.is_open() && t.token_address == trade.token_address) {
            *cache = Some(trades);
            return Ok(false);
        }

        trades.push(trade);
        let result = self.persist(&trades).await;
        if result.is_err() {
            trades.pop();
        }
        *cache = Some(trades);
        result.map(|_| true)
    }

    async fn open_trades(&self) -> Result<Vec<Trade>, PortError> {
        self.with_trades(|trades| trades.iter().filter(|t| t.is_open()).cloned().collect())
            .await
    }

    async fn has_open_trade(&self, token_address: &str) -> Result<bool, PortError> {
        self.with_trades(|trades| {
            trades
                .iter()
                .any(|t| t.is_open() && t.token_address == token_address)
        })
        .await
    }

    async fn close(&self, trade_id: &str, exit: TradeExit) -> Result<Option<Trade>, PortError> {
        let mut cache = self.cache.lock().await;
        let mut trades = match cache.take() {
            Some(trades) => trades,
            None => Self::load(&self.path).await?,
        };

        let Some(index) = trades.iter().position(|t| t.trade_id == trade_id && t.is_open()) else {
            *cache = Some(trades);
            return Ok(None);
        };

        let previous = trades[index].clone();
        if let Err(e) = trades[index].close(exit) {
            *cache = Some(trades);
            return Err(PortError::Rejected(e.to_string()));
        }
        let closed = trades[index].clone();

        let result = self.persist(&trades).await;
        if result.is_err() {
            trades[index] = previous;
        }
        *cache = Some(trades);
        result.map(|_| Some(closed))
    }

    async fn get(&self, trade_id: &str) -> Result<Option<Trade>, PortError> {
        self.with_trades(|trades| trades.iter().find(|t| t.trade_id == trade_id).cloned())
            .await
    }

    async fn trades_since(&self, since: DateTime<Utc>) -> Result<Vec<Trade>, PortError> {
        let mut trades = self
            .with_trades(|trades| {
                trades
                    .iter()
                    .filter(|t| t.entry_time >= since)
                    .cloned()
                    .collect::<Vec<_>>()
            })
            .await?;
        trades.sort_by_key(|t| t.entry_time);
        Ok(trades)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CloseReason, TradeParameters};
    use chrono::{Duration, TimeZone};
    use tempfile::TempDir;

    fn entry() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 14, 12, 0, 0).unwrap()
    }

    fn trade(id: &str, token: &str) -> Trade {
        let params = TradeParameters { stop_loss_pct: 0.1, take_profit_pct: 0.3, position_size_pct: 0.1 };
        Trade::open(id, token, 1.0, 100.0, params, entry())
    }

    #[tokio::test]
    async fn test_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("trades.json");

        let store = JsonTradeStore::new(&path);
        assert!(store.insert_open(trade("t1", "mint_a")).await.unwrap());
        assert!(store.insert_open(trade("t2", "mint_b")).await.unwrap());
        let exit = TradeExit { price: 1.3, time: entry() + Duration::hours(1), reason: CloseReason::TakeProfit };
        store.close("t1", exit).await.unwrap().unwrap();

        let reopened = JsonTradeStore::new(&path);
        let open = reopened.open_trades().await.unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].trade_id, "t2");

        let closed = reopened.get("t1").await.unwrap().unwrap();
        assert_eq!(closed.close_reason, Some(CloseReason::TakeProfit));
        assert!((closed.pnl.unwrap() - 30.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_one_open_trade_per_token() {
        let dir = TempDir::new().unwrap();
        let store = JsonTradeStore::new(dir.path().join("trades.json"));

        assert!(store.insert_open(trade("t1", "mint")).await.unwrap());
        assert!(!store.insert_open(trade("t2", "mint")).await.unwrap());
        assert!(matches!(
            store.insert_open(trade("t1", "other")).await,
            Err(PortError::Conflict(_))
        ));
        assert!(store.has_open_trade("mint").await.unwrap());
        assert!(!store.has_open_trade("other").await.unwrap());
    }

    #[tokio::test]
    async fn test_second_close_loses() {
        let dir = TempDir::new().unwrap();
        let store = JsonTradeStore::new(dir.path().join("trades.json"));
        store.insert_open(trade("t1", "mint")).await.unwrap();

        let exit = TradeExit { price: 0.9, time: entry() + Duration::hours(1), reason: CloseReason::StopLoss };
        assert!(store.close("t1", exit).await.unwrap().is_some());
        assert!(store.close("t1", exit).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_corrupted_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("trades.json");
        tokio::fs::write(&path, "[{not json").await.unwrap();

        let store = JsonTradeStore::new(&path);
        assert!(matches!(store.open_trades().await, Err(PortError::Serialization(_))));
        // The corrupted file is left for inspection
        assert_eq!(tokio::fs::read_to_string(&path).await.unwrap(), "[{not json");
    }

    #[tokio::test]
    async fn test_trades_since_ordering() {
        let dir = TempDir::new().unwrap();
        let store = JsonTradeStore::new(dir.path().join("trades.json"));

        let mut late = trade("late", "a");
        late.entry_time = entry() + Duration::hours(5);
        let mut old = trade("old", "b");
        old.entry_time = entry() - Duration::days(30);
        store.insert_open(late).await.unwrap();
        store.insert_open(trade("mid", "c")).await.unwrap();
        store.insert_open(old).await.unwrap();

        let recent = store.trades_since(entry() - Duration::days(7)).await.unwrap();
        let ids: Vec<&str> = recent.iter().map(|t| t.trade_id.as_str()).collect();
        assert_eq!(ids, vec!["mid", "late"]);
    }
}
