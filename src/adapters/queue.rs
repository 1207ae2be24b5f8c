//! In-Process Queue
//!
//! At-least-once message queue shared by the pipeline stages. Received
//! messages stay in flight until acked. A nack returns the message to the
//! back of its topic; so does an in-flight message whose consumer went quiet
//! for longer than the visibility timeout.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::ports::{Delivery, MessageQueue, PortError};

pub const DEFAULT_VISIBILITY_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
struct Message {
    id: u64,
    topic: String,
    payload: Value,
    attempts: u32,
}

#[derive(Debug, Default)]
struct QueueState {
    next_id: u64,
    topics: HashMap<String, VecDeque<Message>>,
    in_flight: HashMap<u64, (Message, Instant)>,
}

impl QueueState {
    fn reclaim_expired(&mut self, visibility: Duration) {
        let now = Instant::now();
        let expired: Vec<u64> = self
            .in_flight
            .iter()
            .filter(|(_, (_, since))| now.duration_since(*since) >= visibility)
            .map(|(id, _)| *id)
            .collect();
        for id in expired {
            if let Some((message, _)) = self.in_flight.remove(&id) {
                tracing::warn!("Message {} on {} was never acked, redelivering", id, message.topic);
                self.requeue(message);
            }
        }
    }

    fn requeue(&mut self, message: Message) {
        self.topics.entry(message.topic.clone()).or_default().push_back(message);
    }
}

#[derive(Debug, Clone)]
pub struct InProcessQueue {
    state: Arc<Mutex<QueueState>>,
    visibility_timeout: Duration,
}

impl InProcessQueue {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(QueueState::default())),
            visibility_timeout: DEFAULT_VISIBILITY_TIMEOUT,
        }
    }

    pub fn with_visibility_timeout(mut self, timeout: Duration) -> Self {
        self.visibility_timeout = timeout;
        self
    }

    /// Messages received but not yet acked, across all topics
    pub async fn in_flight(&self) -> usize {
        self.state.lock().await.in_flight.len()
    }
}

impl Default for InProcessQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MessageQueue for InProcessQueue {
    async fn publish(&self, topic: &str, payload: Value) -> Result<(), PortError> {
        let mut state = self.state.lock().await;
        state.next_id += 1;
        let message = Message {
            id: state.next_id,
            topic: topic.to_string(),
            payload,
            attempts: 0,
        };
        state.requeue(message);
        Ok(())
    }

    async fn receive(&self, topic: &str) -> Result<Option<Delivery>, PortError> {
        let mut state = self.state.lock().await;
        state.reclaim_expired(self.visibility_timeout);

        let Some(mut message) = state.topics.get_mut(topic).and_then(|q| q.pop_front()) else {
            return Ok(None);
        };
        message.attempts += 1;

        let delivery = Delivery {
            id: message.id,
            topic: message.topic.clone(),
            payload: message.payload.clone(),
            attempts: message.attempts,
        };
        state.in_flight.insert(message.id, (message, Instant::now()));
        Ok(Some(delivery))
    }

    async fn ack(&self, delivery_id: u64) -> Result<(), PortError> {
        let mut state = self.state.lock().await;
        state
            .in_flight
            .remove(&delivery_id)
            .map(|_| ())
            .ok_or_else(|| PortError::NotFound(format!("delivery {} is not in flight", delivery_id)))
    }

    async fn nack(&self, delivery_id: u64) -> Result<(), PortError> {
        let mut state = self.state.lock().await;
        let (message, _) = state
            .in_flight
            .remove(&delivery_id)
            .ok_or_else(|| PortError::NotFound(format!("delivery {} is not in flight", delivery_id)))?;
        state.requeue(message);
        Ok(())
    }

    async fn pending(&self, topic: &str) -> Result<usize, PortError> {
        Ok(self.state.lock().await.topics.get(topic).map_or(0, |q| q.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_fifo_per_topic() {
        let queue = InProcessQueue::new();
        queue.publish("a", json!(1)).await.unwrap();
        queue.publish("b", json!(2)).await.unwrap();
        queue.publish("a", json!(3)).await.unwrap();

        assert_eq!(queue.receive("a").await.unwrap().unwrap().payload, json!(1));
        assert_eq!(queue.receive("a").await.unwrap().unwrap().payload, json!(3));
        assert!(queue.receive("a").await.unwrap().is_none());
        assert_eq!(queue.pending("b").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_nack_redelivers_with_attempts() {
        let queue = InProcessQueue::new();
        queue.publish("a", json!({"token_address": "mint"})).await.unwrap();

        let first = queue.receive("a").await.unwrap().unwrap();
        assert_eq!(first.attempts, 1);
        queue.nack(first.id).await.unwrap();

        let second = queue.receive("a").await.unwrap().unwrap();
        assert_eq!(second.id, first.id);
        assert_eq!(second.attempts, 2);
        queue.ack(second.id).await.unwrap();

        assert_eq!(queue.in_flight().await, 0);
        assert!(queue.ack(second.id).await.is_err());
    }

    #[tokio::test]
    async fn test_unacked_messages_return() {
        let queue = InProcessQueue::new().with_visibility_timeout(Duration::from_millis(20));
        queue.publish("a", json!(1)).await.unwrap();

        let first = queue.receive("a").await.unwrap().unwrap();
        assert!(queue.receive("a").await.unwrap().is_none());

        tokio::time::sleep(Duration::from_millis(40)).await;
        let again = queue.receive("a").await.unwrap().unwrap();
        assert_eq!(again.id, first.id);
        assert_eq!(again.attempts, 2);
    }
}
