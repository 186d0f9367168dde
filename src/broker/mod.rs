//! Durable topic broker behind a narrow publish/lease/ack interface.
//!
//! Producers publish to named topics; consumers lease one message at a
//! time and either ack it (done) or nack it (requeued at the head with an
//! incremented attempt counter). Redelivery and dead-letter policy beyond
//! that belong to the broker operator, not to this service.

mod factory;
mod memory;
mod redis_backend;

pub use factory::create_broker;
pub use memory::MemoryBroker;
pub use redis_backend::RedisBroker;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Result;

/// A message taken from a topic but not yet acknowledged.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeasedMessage {
    pub id: Uuid,
    pub attempts: u32,
    pub payload: String,
}

impl LeasedMessage {
    pub fn new(payload: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            attempts: 0,
            payload,
        }
    }
}

#[async_trait]
pub trait MessageBroker: Send + Sync {
    async fn publish(&self, topic: &str, payload: &str) -> Result<()>;

    /// Take the next message off the topic, if any.
    async fn lease(&self, topic: &str) -> Result<Option<LeasedMessage>>;

    /// Acknowledge a leased message as processed.
    async fn ack(&self, topic: &str, id: Uuid) -> Result<()>;

    /// Return a leased message to the head of the topic for redelivery.
    async fn nack(&self, topic: &str, id: Uuid) -> Result<()>;
}
