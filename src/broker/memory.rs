//! In-memory broker backend using DashMap.
//!
//! Messages are lost on restart; suitable for development and tests.

use std::collections::VecDeque;

use async_trait::async_trait;
use dashmap::DashMap;
use uuid::Uuid;

use crate::error::Result;

use super::{LeasedMessage, MessageBroker};

#[derive(Default)]
pub struct MemoryBroker {
    /// Per-topic ready queues
    ready: DashMap<String, VecDeque<LeasedMessage>>,
    /// In-flight messages awaiting ack
    pending: DashMap<(String, Uuid), LeasedMessage>,
}

impl MemoryBroker {
    pub fn new() -> Self {
        Self {
            ready: DashMap::new(),
            pending: DashMap::new(),
        }
    }

    /// Number of ready (not in-flight) messages on a topic.
    pub fn depth(&self, topic: &str) -> usize {
        self.ready.get(topic).map(|q| q.len()).unwrap_or(0)
    }
}

#[async_trait]
impl MessageBroker for MemoryBroker {
    async fn publish(&self, topic: &str, payload: &str) -> Result<()> {
        let message = LeasedMessage::new(payload.to_string());
        tracing::debug!(topic = %topic, message_id = %message.id, "Message published");
        self.ready
            .entry(topic.to_string())
            .or_default()
            .push_back(message);
        Ok(())
    }

    async fn lease(&self, topic: &str) -> Result<Option<LeasedMessage>> {
        let Some(mut queue) = self.ready.get_mut(topic) else {
            return Ok(None);
        };
        let Some(message) = queue.pop_front() else {
            return Ok(None);
        };
        drop(queue);
        self.pending
            .insert((topic.to_string(), message.id), message.clone());
        Ok(Some(message))
    }

    async fn ack(&self, topic: &str, id: Uuid) -> Result<()> {
        if self.pending.remove(&(topic.to_string(), id)).is_none() {
            tracing::debug!(topic = %topic, message_id = %id, "Ack for unknown lease ignored");
        }
        Ok(())
    }

    async fn nack(&self, topic: &str, id: Uuid) -> Result<()> {
        let Some((_, mut message)) = self.pending.remove(&(topic.to_string(), id)) else {
            tracing::debug!(topic = %topic, message_id = %id, "Nack for unknown lease ignored");
            return Ok(());
        };
        message.attempts += 1;
        tracing::debug!(
            topic = %topic,
            message_id = %id,
            attempts = message.attempts,
            "Message returned for redelivery"
        );
        self.ready
            .entry(topic.to_string())
            .or_default()
            .push_front(message);
        Ok(())
    }
}
