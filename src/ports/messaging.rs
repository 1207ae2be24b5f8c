//! Stage-to-stage message queue with at-least-once delivery.
//!
//! A received message stays in flight until it is acked; a nack (or a
//! consumer that never acks) returns it to the queue with its attempt count
//! bumped.

use async_trait::async_trait;
use serde_json::Value;

use super::PortError;

/// Well-known topics
pub mod topics {
    /// Discovery feed -> analyzer
    pub const CANDIDATES: &str = "migration.candidates";
    /// Analyzer -> trader
    pub const DECISIONS: &str = "trade.decisions";
}

/// A message handed to a consumer
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    pub id: u64,
    pub topic: String,
    pub payload: Value,
    /// 1 on first delivery
    pub attempts: u32,
}

#[async_trait]
pub trait MessageQueue: Send + Sync {
    async fn publish(&self, topic: &str, payload: Value) -> Result<(), PortError>;

    /// Next message on `topic`, if any. Does not block.
    async fn receive(&self, topic: &str) -> Result<Option<Delivery>, PortError>;

    async fn ack(&self, delivery_id: u64) -> Result<(), PortError>;

    /// Return the message to the queue for redelivery
    async fn nack(&self, delivery_id: u64) -> Result<(), PortError>;

    /// Messages waiting on `topic`, not counting in-flight ones
    async fn pending(&self, topic: &str) -> Result<usize, PortError>;
}
