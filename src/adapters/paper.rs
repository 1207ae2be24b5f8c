//! Paper Execution
//!
//! Simulated fills for the execution port. Buys fill above the reference
//! price and sells below it by the configured slippage; an order whose
//! tolerance is tighter than the simulated slippage is rejected the way a
//! real venue would reject it.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::info;

use crate::ports::{ExecutionPort, Fill, OrderRequest, PortError};

/// Default simulated slippage (0.5%)
pub const DEFAULT_PAPER_SLIPPAGE: f64 = 0.005;

/// Trade direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeSide {
    Buy,
    Sell,
}

impl std::fmt::Display for TradeSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TradeSide::Buy => write!(f, "BUY"),
            TradeSide::Sell => write!(f, "SELL"),
        }
    }
}

/// One simulated fill
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaperFill {
    pub signature: String,
    pub token_address: String,
    pub side: TradeSide,
    pub amount_usd: f64,
    pub reference_price: f64,
    pub price: f64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct PaperExecution {
    slippage: f64,
    fills: Arc<Mutex<Vec<PaperFill>>>,
}

impl PaperExecution {
    pub fn new(slippage: f64) -> Self {
        Self {
            slippage: slippage.max(0.0),
            fills: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn slippage(&self) -> f64 {
        self.slippage
    }

    pub async fn fills(&self) -> Vec<PaperFill> {
        self.fills.lock().await.clone()
    }

    async fn simulate(&self, side: TradeSide, order: &OrderRequest) -> Result<Fill, PortError> {
        if !order.reference_price.is_finite() || order.reference_price <= 0.0 {
            return Err(PortError::Rejected(format!(
                "invalid reference price {} for {}",
                order.reference_price, order.token_address
            )));
        }
        if !order.amount_usd.is_finite() || order.amount_usd <= 0.0 {
            return Err(PortError::Rejected(format!("invalid order size {}", order.amount_usd)));
        }
        if self.slippage > order.max_slippage {
            return Err(PortError::Rejected(format!(
                "slippage {:.2}% exceeds tolerance {:.2}%",
                self.slippage * 100.0,
                order.max_slippage * 100.0
            )));
        }

        // Buy = worse price = higher, sell = lower
        let price = match side {
            TradeSide::Buy => order.reference_price * (1.0 + self.slippage),
            TradeSide::Sell => order.reference_price * (1.0 - self.slippage),
        };

        let fill = PaperFill {
            signature: paper_signature(),
            token_address: order.token_address.clone(),
            side,
            amount_usd: order.amount_usd,
            reference_price: order.reference_price,
            price,
            timestamp: Utc::now(),
        };

        info!(
            "[PAPER] {} ${:.2} of {} @ {:.8} (ref {:.8}, sig {})",
            side, fill.amount_usd, fill.token_address, fill.price, fill.reference_price, fill.signature
        );

        let result = Fill {
            signature: fill.signature.clone(),
            price,
            amount_usd: order.amount_usd,
        };
        self.fills.lock().await.push(fill);
        Ok(result)
    }
}

impl Default for PaperExecution {
    fn default() -> Self {
        Self::new(DEFAULT_PAPER_SLIPPAGE)
    }
}

fn paper_signature() -> String {
    let mut rng = rand::thread_rng();
    let suffix: String = (0..16)
        .map(|_| format!("{:x}", rng.gen_range(0..16u8)))
        .collect();
    format!("paper_{}", suffix)
}

#[async_trait]
impl ExecutionPort for PaperExecution {
    async fn buy(&self, order: &OrderRequest) -> Result<Fill, PortError> {
        self.simulate(TradeSide::Buy, order).await
    }

    async fn sell(&self, order: &OrderRequest) -> Result<Fill, PortError> {
        self.simulate(TradeSide::Sell, order).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[tokio::test]
    async fn test_slippage_application() {
        let engine = PaperExecution::new(0.01);
        let order = OrderRequest::new("mint", 100.0, 0.001, 0.02);

        let buy = engine.buy(&order).await.unwrap();
        assert_relative_eq!(buy.price, 0.00101, epsilon = 1e-15);

        let sell = engine.sell(&order).await.unwrap();
        assert_relative_eq!(sell.price, 0.00099, epsilon = 1e-15);

        assert_ne!(buy.signature, sell.signature);
        assert!(buy.signature.starts_with("paper_"));
        assert_eq!(engine.fills().await.len(), 2);
    }

    #[tokio::test]
    async fn test_tolerance_exceeded() {
        let engine = PaperExecution::new(0.03);
        let order = OrderRequest::new("mint", 100.0, 1.0, 0.02);
        assert!(matches!(engine.buy(&order).await, Err(PortError::Rejected(_))));
        assert!(engine.fills().await.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_orders() {
        let engine = PaperExecution::default();
        assert!(engine.buy(&OrderRequest::new("mint", 100.0, 0.0, 0.02)).await.is_err());
        assert!(engine.sell(&OrderRequest::new("mint", -5.0, 1.0, 0.02)).await.is_err());
    }
}
