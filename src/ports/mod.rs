//! Ports Layer - Trait definitions for external dependencies
//!
//! This module defines the interfaces (ports) that adapters must implement.
//! Following hexagonal architecture, these traits abstract:
//! - Persistence (trades, analyses, configuration documents, optimizer runs)
//! - The stage-to-stage message queue
//! - Pool prices and trade execution
//! - The parameter-search oracle
//! - Secrets
//!
//! Every port has a production adapter under `adapters` and an in-memory
//! implementation in [`mocks`].

pub mod execution;
pub mod market;
pub mod messaging;
pub mod mocks;
pub mod oracle;
pub mod secrets;
pub mod storage;

use thiserror::Error;

pub use execution::{ExecutionPort, Fill, OrderRequest};
pub use market::PriceOracle;
pub use messaging::{topics, Delivery, MessageQueue};
pub use oracle::ScoringOracle;
pub use secrets::SecretStore;
pub use storage::{backup_key, AnalysisStore, ConfigStore, OptimizationLog, TradeStore};

/// Error shared by every port
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PortError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    /// The counterparty refused the request (bad order, rejected fill)
    #[error("Rejected: {0}")]
    Rejected(String),

    #[error("Conflict: {0}")]
    Conflict(String),
}

impl From<std::io::Error> for PortError {
    fn from(err: std::io::Error) -> Self {
        PortError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for PortError {
    fn from(err: serde_json::Error) -> Self {
        PortError::Serialization(err.to_string())
    }
}

impl PortError {
    /// Whether retrying the same call later could succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, PortError::Unavailable(_) | PortError::Timeout(_) | PortError::Io(_))
    }
}
