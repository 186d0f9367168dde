use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;

use crate::broker::{LeasedMessage, MessageBroker};
use crate::config::BrokerConfig;
use crate::error::Result;
use crate::events::{GreetingsInitiator, SubscribedEvent};

/// Consumes [`SubscribedEvent`] messages and triggers the welcome email.
pub struct SubscribedEventConsumer {
    broker: Arc<dyn MessageBroker>,
    initiator: Arc<GreetingsInitiator>,
    topic: String,
    poll_interval: Duration,
    shutdown: broadcast::Sender<()>,
}

impl SubscribedEventConsumer {
    pub fn new(
        broker: Arc<dyn MessageBroker>,
        initiator: Arc<GreetingsInitiator>,
        config: &BrokerConfig,
    ) -> Self {
        let (shutdown, _) = broadcast::channel(1);
        Self {
            broker,
            initiator,
            topic: config.subscribed_topic.clone(),
            poll_interval: Duration::from_millis(config.poll_interval_ms),
            shutdown,
        }
    }

    pub fn shutdown_signal(&self) -> broadcast::Sender<()> {
        self.shutdown.clone()
    }

    pub async fn start(&self) -> Result<()> {
        tracing::info!(topic = %self.topic, "Starting subscribed event consumer");

        let mut shutdown_rx = self.shutdown.subscribe();
        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    tracing::info!(topic = %self.topic, "Subscribed event consumer stopping");
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
        let event: SubscribedEvent = match serde_json::from_str(&message.payload) {
            Ok(e) => e,
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    message_id = %message.id,
                    "Discarding undecodable subscribed event"
                );
                return self.broker.ack(&self.topic, message.id).await;
            }
        };

        match self.initiator.handle(&event).await {
            Ok(()) => self.broker.ack(&self.topic, message.id).await,
            Err(e) => {
                tracing::error!(
                    error = %e,
                    subscription_id = %event.subscription.full_id(),
                    attempts = message.attempts,
                    "Welcome delivery failed, returning to topic"
                );
                self.broker.nack(&self.topic, message.id).await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::MemoryBroker;
    use crate::config::NotificationConfig;
    use crate::email::LogDispatcher;
    use crate::error::AppError;
    use crate::notification::NotificationFlow;
    use crate::subscription::Subscription;
    use crate::template::{MemoryBlobStore, MemoryTemplateStore, TemplateRenderer};
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// Wraps a memory broker and errors on the first ack.
    struct FlakyAckBroker {
        inner: MemoryBroker,
        ack_failed: AtomicBool,
    }

    impl FlakyAckBroker {
        fn new() -> Self {
            Self {
                inner: MemoryBroker::new(),
                ack_failed: AtomicBool::new(false),
            }
        }
    }

    #[async_trait]
    impl MessageBroker for FlakyAckBroker {
        async fn publish(&self, topic: &str, payload: &str) -> Result<()> {
            self.inner.publish(topic, payload).await
        }

        async fn lease(&self, topic: &str) -> Result<Option<LeasedMessage>> {
            self.inner.lease(topic).await
        }

        async fn ack(&self, topic: &str, id: uuid::Uuid) -> Result<()> {
            if !self.ack_failed.swap(true, Ordering::SeqCst) {
                return Err(AppError::Broker("connection dropped".to_string()));
            }
            self.inner.ack(topic, id).await
        }

        async fn nack(&self, topic: &str, id: uuid::Uuid) -> Result<()> {
            self.inner.nack(topic, id).await
        }
    }

    fn event(email: &str) -> String {
        let event = SubscribedEvent {
            subscription: Subscription {
                belonging: Subscription::build_belonging("acme.example", "welcome"),
                email: email.to_string(),
                first_name: "Alice".to_string(),
                last_name: None,
                source: None,
                subscribed_at: Utc::now(),
                unsubscribed_at: None,
                client_ip: None,
            },
        };
        serde_json::to_string(&event).unwrap()
    }

    #[tokio::test]
    async fn test_poll_loop_survives_ack_failure() {
        // No template configured: every event is absorbed as a skip.
        let config = NotificationConfig {
            self_host: "notify.test.example".to_string(),
            template_folder: "emailtemplates".to_string(),
            contact_channel: "contactus".to_string(),
        };
        let renderer = Arc::new(TemplateRenderer::new(
            Arc::new(MemoryTemplateStore::new()),
            Arc::new(MemoryBlobStore::new()),
            config,
        ));
        let flow = Arc::new(NotificationFlow::new(renderer, Arc::new(LogDispatcher)));
        let greetings = Arc::new(GreetingsInitiator::new(flow.clone()));

        let broker = Arc::new(FlakyAckBroker::new());
        let broker_config = BrokerConfig {
            poll_interval_ms: 10,
            ..BrokerConfig::default()
        };
        let consumer = Arc::new(SubscribedEventConsumer::new(
            broker.clone(),
            greetings,
            &broker_config,
        ));
        let shutdown = consumer.shutdown_signal();
        let consumer_clone = consumer.clone();
        let handle = tokio::spawn(async move { consumer_clone.start().await });

        for email in ["a@b.example", "c@d.example"] {
            broker
                .publish(&broker_config.subscribed_topic, &event(email))
                .await
                .unwrap();
        }

        // The first ack errors; the second event must still be processed.
        for _ in 0..200 {
            if flow.stats().skipped >= 2 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(flow.stats().skipped, 2);
        assert!(!handle.is_finished());

        shutdown.send(()).unwrap();
        handle.await.unwrap().unwrap();
    }
}
