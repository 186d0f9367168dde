//! Redis-backed broker using a list per topic plus a pending hash.
//!
//! Ready messages live in `{prefix}:{topic}` (RPUSH/LPOP); leased
//! messages move to `{prefix}:{topic}:pending` until acked, so a crashed
//! consumer leaves an inspectable trail instead of silently losing work.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use uuid::Uuid;

use crate::error::{AppError, Result};

use super::{LeasedMessage, MessageBroker};

pub struct RedisBroker {
    connection: ConnectionManager,
    prefix: String,
}

impl RedisBroker {
    pub fn new(connection: ConnectionManager, prefix: String) -> Self {
        Self { connection, prefix }
    }

    fn ready_key(&self, topic: &str) -> String {
        format!("{}:{}", self.prefix, topic)
    }

    fn pending_key(&self, topic: &str) -> String {
        format!("{}:{}:pending", self.prefix, topic)
    }

    fn encode(message: &LeasedMessage) -> Result<String> {
        serde_json::to_string(message)
            .map_err(|e| AppError::Broker(format!("Cannot encode message: {}", e)))
    }

    fn decode(raw: &str) -> Result<LeasedMessage> {
        serde_json::from_str(raw)
            .map_err(|e| AppError::Broker(format!("Cannot decode message: {}", e)))
    }
}

#[async_trait]
impl MessageBroker for RedisBroker {
    async fn publish(&self, topic: &str, payload: &str) -> Result<()> {
        let message = LeasedMessage::new(payload.to_string());
        let encoded = Self::encode(&message)?;
        let mut conn = self.connection.clone();
        let _: () = conn.rpush(self.ready_key(topic), encoded).await?;
        tracing::debug!(topic = %topic, message_id = %message.id, "Message published");
        Ok(())
    }

    async fn lease(&self, topic: &str) -> Result<Option<LeasedMessage>> {
        let mut conn = self.connection.clone();
        let raw: Option<String> = conn.lpop(self.ready_key(topic), None).await?;
        let Some(raw) = raw else {
            return Ok(None);
        };
        let message = Self::decode(&raw)?;
        let _: () = conn
            .hset(self.pending_key(topic), message.id.to_string(), raw)
            .await?;
        Ok(Some(message))
    }

    async fn ack(&self, topic: &str, id: Uuid) -> Result<()> {
        let mut conn = self.connection.clone();
        let _: () = conn.hdel(self.pending_key(topic), id.to_string()).await?;
        Ok(())
    }

    async fn nack(&self, topic: &str, id: Uuid) -> Result<()> {
        let mut conn = self.connection.clone();
        let raw: Option<String> = conn.hget(self.pending_key(topic), id.to_string()).await?;
        let Some(raw) = raw else {
            tracing::debug!(topic = %topic, message_id = %id, "Nack for unknown lease ignored");
            return Ok(());
        };
        let mut message = Self::decode(&raw)?;
        message.attempts += 1;
        let encoded = Self::encode(&message)?;
        let _: () = conn.hdel(self.pending_key(topic), id.to_string()).await?;
        let _: () = conn.lpush(self.ready_key(topic), encoded).await?;
        tracing::debug!(
            topic = %topic,
            message_id = %id,
            attempts = message.attempts,
            "Message returned for redelivery"
        );
        Ok(())
    }
}
