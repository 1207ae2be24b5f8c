//! Trade Records
//!
//! A trade is opened once per token and closed exactly once, either by the
//! position monitor (stop-loss / take-profit) or manually.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::agent_config::ConfigArm;

/// Price tolerance for stop-loss / take-profit comparisons
pub const PRICE_EPSILON: f64 = 1e-12;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum TradeError {
    #[error("Trade {0} is already closed")]
    AlreadyClosed(String),
    #[error("Invalid price: {0}")]
    InvalidPrice(f64),
    #[error("Exit time precedes entry for trade {0}")]
    ExitBeforeEntry(String),
}

/// Risk parameters in force for a trade
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TradeParameters {
    /// Fractional stop-loss distance below entry (0.10 = -10%)
    pub stop_loss_pct: f64,
    /// Fractional take-profit distance above entry (0.30 = +30%)
    pub take_profit_pct: f64,
    /// Fraction of trading capital committed
    pub position_size_pct: f64,
}

impl TradeParameters {
    pub fn stop_loss_price(&self, entry_price: f64) -> f64 {
        entry_price * (1.0 - self.stop_loss_pct)
    }

    pub fn take_profit_price(&self, entry_price: f64) -> f64 {
        entry_price * (1.0 + self.take_profit_pct)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TradeStatus {
    Open,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CloseReason {
    StopLoss,
    TakeProfit,
    Manual,
}

impl std::fmt::Display for CloseReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CloseReason::StopLoss => write!(f, "stop_loss"),
            CloseReason::TakeProfit => write!(f, "take_profit"),
            CloseReason::Manual => write!(f, "manual"),
        }
    }
}

/// Exit details applied when a trade closes
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TradeExit {
    pub price: f64,
    pub time: DateTime<Utc>,
    pub reason: CloseReason,
}

/// A position opened by the trader
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub trade_id: String,
    pub token_address: String,
    pub status: TradeStatus,
    /// Quality score (0-100) at entry
    #[serde(default)]
    pub quality_score: u32,
    /// USD notional committed at entry
    pub amount_usd: f64,
    pub parameters: TradeParameters,
    pub entry_price: f64,
    pub entry_time: DateTime<Utc>,
    #[serde(default)]
    pub exit_price: Option<f64>,
    #[serde(default)]
    pub exit_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub close_reason: Option<CloseReason>,
    /// Realized P&L in USD, set on close
    #[serde(default)]
    pub pnl: Option<f64>,
    #[serde(default)]
    pub arm: ConfigArm,
    #[serde(default)]
    pub entry_signature: Option<String>,
}

impl Trade {
    pub fn open(
        trade_id: impl Into<String>,
        token_address: impl Into<String>,
        entry_price: f64,
        amount_usd: f64,
        parameters: TradeParameters,
        entry_time: DateTime<Utc>,
    ) -> Self {
        Self {
            trade_id: trade_id.into(),
            token_address: token_address.into(),
            status: TradeStatus::Open,
            quality_score: 0,
            amount_usd,
            parameters,
            entry_price,
            entry_time,
            exit_price: None,
            exit_time: None,
            close_reason: None,
            pnl: None,
            arm: ConfigArm::A,
            entry_signature: None,
        }
    }

    pub fn with_quality_score(mut self, quality_score: u32) -> Self {
        self.quality_score = quality_score;
        self
    }

    pub fn with_arm(mut self, arm: ConfigArm) -> Self {
        self.arm = arm;
        self
    }

    pub fn with_signature(mut self, signature: impl Into<String>) -> Self {
        self.entry_signature = Some(signature.into());
        self
    }

    pub fn is_open(&self) -> bool {
        self.status == TradeStatus::Open
    }

    /// Which exit, if any, the given price triggers. Stop-loss wins when both
    /// would trigger.
    pub fn exit_trigger(&self, price: f64) -> Option<CloseReason> {
        if !self.is_open() || !price.is_finite() {
            return None;
        }
        if price <= self.parameters.stop_loss_price(self.entry_price) + PRICE_EPSILON {
            Some(CloseReason::StopLoss)
        } else if price >= self.parameters.take_profit_price(self.entry_price) - PRICE_EPSILON {
            Some(CloseReason::TakeProfit)
        } else {
            None
        }
    }

    /// Realized P&L in USD if closed at `exit_price`
    pub fn pnl_at(&self, exit_price: f64) -> f64 {
        if self.entry_price <= 0.0 {
            return 0.0;
        }
        self.amount_usd * (exit_price / self.entry_price - 1.0)
    }

    /// Transition open -> closed. Fails without mutating if already closed.
    pub fn close(&mut self, exit: TradeExit) -> Result<(), TradeError> {
        if !self.is_open() {
            return Err(TradeError::AlreadyClosed(self.trade_id.clone()));
        }
        if !exit.price.is_finite() || exit.price < 0.0 {
            return Err(TradeError::InvalidPrice(exit.price));
        }
        if exit.time < self.entry_time {
            return Err(TradeError::ExitBeforeEntry(self.trade_id.clone()));
        }

        self.pnl = Some(self.pnl_at(exit.price));
        self.exit_price = Some(exit.price);
        self.exit_time = Some(exit.time);
        self.close_reason = Some(exit.reason);
        self.status = TradeStatus::Closed;
        Ok(())
    }

    /// Holding duration in hours, when both timestamps are known
    pub fn duration_hours(&self) -> Option<f64> {
        self.exit_time
            .map(|exit| (exit - self.entry_time).num_milliseconds() as f64 / 3_600_000.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::{Duration, TimeZone};

    fn params(sl: f64, tp: f64) -> TradeParameters {
        TradeParameters { stop_loss_pct: sl, take_profit_pct: tp, position_size_pct: 0.1 }
    }

    fn create_test_trade() -> Trade {
        let entry = Utc.with_ymd_and_hms(2025, 3, 14, 12, 0, 0).unwrap();
        Trade::open("t-1", "mint1", 1.0, 100.0, params(0.10, 0.30), entry)
    }

    #[test]
    fn test_stop_loss_boundary() {
        let trade = create_test_trade();
        assert_eq!(trade.exit_trigger(0.90), Some(CloseReason::StopLoss));
        assert_eq!(trade.exit_trigger(0.91), None);
        assert_eq!(trade.exit_trigger(0.5), Some(CloseReason::StopLoss));
    }

    #[test]
    fn test_take_profit_boundary() {
        let trade = create_test_trade();
        assert_eq!(trade.exit_trigger(1.30), Some(CloseReason::TakeProfit));
        assert_eq!(trade.exit_trigger(1.29), None);
    }

    #[test]
    fn test_stop_loss_checked_first() {
        let entry = Utc.with_ymd_and_hms(2025, 3, 14, 12, 0, 0).unwrap();
        // Degenerate parameters where both levels coincide
        let trade = Trade::open("t-2", "mint1", 1.0, 100.0, params(0.0, 0.0), entry);
        assert_eq!(trade.exit_trigger(1.0), Some(CloseReason::StopLoss));
    }

    #[test]
    fn test_close_sets_pnl_once() {
        let mut trade = create_test_trade();
        let exit_time = trade.entry_time + Duration::hours(3);
        trade
            .close(TradeExit { price: 1.3, time: exit_time, reason: CloseReason::TakeProfit })
            .unwrap();

        assert_eq!(trade.status, TradeStatus::Closed);
        assert_relative_eq!(trade.pnl.unwrap(), 30.0, epsilon = 1e-9);
        assert_relative_eq!(trade.duration_hours().unwrap(), 3.0);

        let again = trade.close(TradeExit { price: 0.5, time: exit_time, reason: CloseReason::Manual });
        assert_eq!(again, Err(TradeError::AlreadyClosed("t-1".to_string())));
        assert_relative_eq!(trade.pnl.unwrap(), 30.0, epsilon = 1e-9);
        assert_eq!(trade.exit_trigger(0.1), None);
    }

    #[test]
    fn test_close_rejects_bad_exit() {
        let mut trade = create_test_trade();
        let early = trade.entry_time - Duration::minutes(1);
        assert!(trade
            .close(TradeExit { price: 1.0, time: early, reason: CloseReason::Manual })
            .is_err());
        assert!(trade
            .close(TradeExit { price: f64::NAN, time: trade.entry_time, reason: CloseReason::Manual })
            .is_err());
        assert!(trade.is_open());
    }
}
