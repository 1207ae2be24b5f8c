use async_trait::async_trait;

use super::PortError;
use crate::domain::{OracleRequest, OracleResponse};

/// External parameter-search service used by the optimizer
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ScoringOracle: Send + Sync {
    async fn optimize(&self, request: &OracleRequest) -> Result<OracleResponse, PortError>;
}
