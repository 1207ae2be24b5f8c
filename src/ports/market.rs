use async_trait::async_trait;

use super::PortError;

/// Current pool price source
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PriceOracle: Send + Sync {
    /// USD price of the token. `NotFound` when the source has no quote.
    async fn price_usd(&self, token_address: &str) -> Result<f64, PortError>;
}
