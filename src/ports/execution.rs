//! Trade execution port
//!
//! Orders carry the reference price the decision was made at and the
//! maximum tolerated slippage; the fill reports the price actually obtained.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::PortError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRequest {
    pub token_address: String,
    /// USD notional to buy or sell
    pub amount_usd: f64,
    /// Price the order was sized against
    pub reference_price: f64,
    /// Fractional slippage tolerance (0.02 = 2%)
    pub max_slippage: f64,
}

impl OrderRequest {
    pub fn new(token_address: impl Into<String>, amount_usd: f64, reference_price: f64, max_slippage: f64) -> Self {
        Self {
            token_address: token_address.into(),
            amount_usd,
            reference_price,
            max_slippage,
        }
    }

    /// Worst acceptable fill price for a buy
    pub fn max_buy_price(&self) -> f64 {
        self.reference_price * (1.0 + self.max_slippage)
    }

    /// Worst acceptable fill price for a sell
    pub fn min_sell_price(&self) -> f64 {
        self.reference_price * (1.0 - self.max_slippage)
    }
}

/// Result of a successful order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fill {
    pub signature: String,
    pub price: f64,
    pub amount_usd: f64,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ExecutionPort: Send + Sync {
    async fn buy(&self, order: &OrderRequest) -> Result<Fill, PortError>;

    async fn sell(&self, order: &OrderRequest) -> Result<Fill, PortError>;
}
