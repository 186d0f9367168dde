//! Broker backend factory.

use std::sync::Arc;

use redis::aio::ConnectionManager;

use crate::config::BrokerConfig;
use crate::error::Result;

use super::memory::MemoryBroker;
use super::redis_backend::RedisBroker;
use super::MessageBroker;

/// Create a broker backend based on configuration.
///
/// - `"redis"`: durable list-backed topics
/// - `"memory"` (default): process-local, for development and tests
pub async fn create_broker(config: &BrokerConfig) -> Result<Arc<dyn MessageBroker>> {
    match config.backend.as_str() {
        "redis" => {
            tracing::info!(
                backend = "redis",
                prefix = %config.prefix,
                "Creating Redis broker"
            );
            let client = redis::Client::open(config.redis_url.as_str())?;
            let connection = ConnectionManager::new(client).await?;
            Ok(Arc::new(RedisBroker::new(connection, config.prefix.clone())))
        }
        _ => {
            tracing::info!(backend = "memory", "Creating memory broker");
            Ok(Arc::new(MemoryBroker::new()))
        }
    }
}
