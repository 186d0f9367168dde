use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;

use crate::api::SubscribeCommand;
use crate::broker::{LeasedMessage, MessageBroker};
use crate::config::BrokerConfig;
use crate::error::Result;
use crate::subscription::SubscriptionDomain;

/// Consumes [`SubscribeCommand`] messages from trusted producers.
///
/// Unlike the HTTP surface there is no risk assessment here: whoever can
/// publish to the topic is already inside the trust boundary.
pub struct SubscribeCommandConsumer {
    broker: Arc<dyn MessageBroker>,
    subscriptions: Arc<SubscriptionDomain>,
    topic: String,
    poll_interval: Duration,
    shutdown: broadcast::Sender<()>,
}

impl SubscribeCommandConsumer {
    pub fn new(
        broker: Arc<dyn MessageBroker>,
        subscriptions: Arc<SubscriptionDomain>,
        config: &BrokerConfig,
    ) -> Self {
        let (shutdown, _) = broadcast::channel(1);
        Self {
            broker,
            subscriptions,
            topic: config.subscribe_topic.clone(),
            poll_interval: Duration::from_millis(config.poll_interval_ms),
            shutdown,
        }
    }

    pub fn shutdown_signal(&self) -> broadcast::Sender<()> {
        self.shutdown.clone()
    }

    pub async fn start(&self) -> Result<()> {
        tracing::info!(topic = %self.topic, "Starting subscribe command consumer");

        let mut shutdown_rx = self.shutdown.subscribe();
        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    tracing::info!(topic = %self.topic, "Subscribe command consumer stopping");
                    break;
                }
                leased = self.broker.lease(&self.topic) => {
                    match leased {
                        // Ack/nack failures are as transient as lease
                        // failures; the loop must outlive all of them.
                        Ok(Some(message)) => {
                            if let Err(e) = self.handle_message(message).await {
                                tracing::error!(error = %e, topic = %self.topic, "Settling message failed, backing off");
                                tokio::time::sleep(self.poll_interval).await;
                            }
                        }
                        Ok(None) => tokio::time::sleep(self.poll_interval).await,
                        Err(e) => {
                            tracing::error!(error = %e, topic = %self.topic, "Lease failed, backing off");
                            tokio::time::sleep(self.poll_interval).await;
                        }
                    }
                }
            }
        }

        Ok(())
    }

    async fn handle_message(&self, message: LeasedMessage) -> Result<()> {
        let mut command: SubscribeCommand = match serde_json::from_str(&message.payload) {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    message_id = %message.id,
                    "Discarding undecodable subscribe command"
                );
                return self.broker.ack(&self.topic, message.id).await;
            }
        };

        command.sanitize();
        if let Err(e) = command.validate() {
            tracing::warn!(
                error = %e,
                message_id = %message.id,
                "Discarding invalid subscribe command"
            );
            return self.broker.ack(&self.topic, message.id).await;
        }

        let result = self
            .subscriptions
            .subscribe(
                &command.tenant,
                &command.channel,
                &command.email,
                &command.first_name,
                command.last_name.as_deref(),
                command.track.as_deref(),
                None,
            )
            .await;

        match result {
            Ok(()) => self.broker.ack(&self.topic, message.id).await,
            Err(e) => {
                tracing::error!(
                    error = %e,
                    email = %command.email,
                    attempts = message.attempts,
                    "Subscribe failed, returning to topic"
                );
                self.broker.nack(&self.topic, message.id).await
            }
        }
    }
}
