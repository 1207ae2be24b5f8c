//! Persistence ports: trades, analyses, configuration documents and the
//! optimizer run log.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::PortError;
use crate::domain::{CompositeAnalysis, ConfigDocument, OptimizationRun, Trade, TradeExit};

/// Trade records
///
/// Implementations must keep at most one open trade per token address and
/// close trades with compare-and-set semantics.
#[async_trait]
pub trait TradeStore: Send + Sync {
    /// Insert a new open trade. Returns `false` without writing when the token
    /// already has an open trade.
    async fn insert_open(&self, trade: Trade) -> Result<bool, PortError>;

    async fn open_trades(&self) -> Result<Vec<Trade>, PortError>;

    async fn has_open_trade(&self, token_address: &str) -> Result<bool, PortError>;

    /// Close an open trade. Returns the closed trade, or `None` if the trade
    /// was not open (unknown, or closed by someone else first).
    async fn close(&self, trade_id: &str, exit: TradeExit) -> Result<Option<Trade>, PortError>;

    async fn get(&self, trade_id: &str) -> Result<Option<Trade>, PortError>;

    /// Trades entered at or after `since`, oldest first
    async fn trades_since(&self, since: DateTime<Utc>) -> Result<Vec<Trade>, PortError>;
}

/// Append-only record of every composite analysis
#[async_trait]
pub trait AnalysisStore: Send + Sync {
    async fn record(&self, analysis: &CompositeAnalysis) -> Result<(), PortError>;

    /// Most recent analyses, newest last
    async fn recent(&self, limit: usize) -> Result<Vec<CompositeAnalysis>, PortError>;
}

/// Agent configuration documents: one current pointer plus an append-only
/// backup history
#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// `None` when no document has been stored yet
    async fn load_current(&self) -> Result<Option<ConfigDocument>, PortError>;

    async fn save_current(&self, document: &ConfigDocument) -> Result<(), PortError>;

    /// Store a timestamped copy and return its key. Never overwrites an
    /// existing backup.
    async fn save_backup(&self, document: &ConfigDocument, at: DateTime<Utc>) -> Result<String, PortError>;

    async fn list_backups(&self) -> Result<Vec<String>, PortError>;

    async fn load_backup(&self, key: &str) -> Result<ConfigDocument, PortError>;
}

/// Append-only log of optimizer runs
#[async_trait]
pub trait OptimizationLog: Send + Sync {
    async fn append(&self, run: &OptimizationRun) -> Result<(), PortError>;

    async fn runs(&self) -> Result<Vec<OptimizationRun>, PortError>;
}

/// Backup key for a document stored at `at`: `config_YYYYmmdd_HHMMSS`, with
/// a `_n` suffix when the second is already taken.
pub fn backup_key(at: DateTime<Utc>, existing: &[String]) -> String {
    let base = format!("config_{}", at.format("%Y%m%d_%H%M%S"));
    if !existing.iter().any(|k| *k == base) {
        return base;
    }
    (1..)
        .map(|n| format!("{}_{}", base, n))
        .find(|candidate| !existing.contains(candidate))
        .unwrap_or(base)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_backup_key_suffixes() {
        let at = Utc.with_ymd_and_hms(2025, 3, 14, 9, 5, 7).unwrap();
        assert_eq!(backup_key(at, &[]), "config_20250314_090507");

        let taken = vec!["config_20250314_090507".to_string()];
        assert_eq!(backup_key(at, &taken), "config_20250314_090507_1");

        let taken = vec![
            "config_20250314_090507".to_string(),
            "config_20250314_090507_1".to_string(),
        ];
        assert_eq!(backup_key(at, &taken), "config_20250314_090507_2");
    }
}
