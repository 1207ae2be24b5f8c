//! Adapters Layer - External System Implementations
//!
//! This module contains implementations of the port traits:
//! - Storage: JSON/JSONL files for trades, analyses, optimizer runs and configuration
//! - Queue: in-process at-least-once message queue
//! - Market Data: Jupiter price API behind the price oracle port
//! - Paper: simulated execution
//! - Oracle: HTTP client for the parameter-search service
//! - Secrets: environment-backed secret lookup
//! - Discovery: JSON-lines candidate feeds
//! - CLI: Command-line interface handlers

pub mod cli;
pub mod discovery;
pub mod market_data;
pub mod oracle;
pub mod paper;
pub mod queue;
pub mod secrets;
pub mod storage;

pub use cli::CliApp;
pub use market_data::JupiterPriceClient;
pub use oracle::HttpScoringOracle;
pub use paper::PaperExecution;
pub use queue::InProcessQueue;
pub use secrets::EnvSecretStore;
pub use storage::FileStores;
