use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;

use crate::broker::{LeasedMessage, MessageBroker};
use crate::config::BrokerConfig;
use crate::error::Result;
use crate::notification::{NotificationFlow, NotifyCommand};

/// Consumes [`NotifyCommand`] messages and hands them to the flow.
pub struct NotifyCommandConsumer {
    broker: Arc<dyn MessageBroker>,
    flow: Arc<NotificationFlow>,
    topic: String,
    poll_interval: Duration,
    shutdown: broadcast::Sender<()>,
}

impl NotifyCommandConsumer {
    pub fn new(
        broker: Arc<dyn MessageBroker>,
        flow: Arc<NotificationFlow>,
        config: &BrokerConfig,
    ) -> Self {
        let (shutdown, _) = broadcast::channel(1);
        Self {
            broker,
            flow,
            topic: config.notify_topic.clone(),
            poll_interval: Duration::from_millis(config.poll_interval_ms),
            shutdown,
        }
    }

    pub fn shutdown_signal(&self) -> broadcast::Sender<()> {
        self.shutdown.clone()
    }

    /// Poll the topic until a shutdown signal arrives.
    pub async fn start(&self) -> Result<()> {
        tracing::info!(topic = %self.topic, "Starting notify command consumer");

        let mut shutdown_rx = self.shutdown.subscribe();
        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    tracing::info!(topic = %self.topic, "Notify command consumer stopping");
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
        let command: NotifyCommand = match serde_json::from_str(&message.payload) {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    message_id = %message.id,
                    "Discarding undecodable notify command"
                );
                return self.broker.ack(&self.topic, message.id).await;
            }
        };

        if let Err(e) = command.validate() {
            tracing::warn!(
                error = %e,
                command_id = %command.id,
                "Discarding invalid notify command"
            );
            return self.broker.ack(&self.topic, message.id).await;
        }

        match self.flow.deliver(&command).await {
            Ok(()) => self.broker.ack(&self.topic, message.id).await,
            Err(e) => {
                tracing::error!(
                    error = %e,
                    command_id = %command.id,
                    attempts = message.attempts,
                    "Notify command failed, returning to topic"
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
    use crate::email::{EmailAddress, EmailDispatcher, LogDispatcher};
    use crate::error::AppError;
    use crate::template::{
        MemoryBlobStore, MemoryTemplateStore, Template, TemplateRenderer,
    };
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct FailingDispatcher;

    #[async_trait]
    impl EmailDispatcher for FailingDispatcher {
        async fn send(
            &self,
            _from: &EmailAddress,
            _recipients: &[EmailAddress],
            _subject: &str,
            _body: &str,
        ) -> Result<bool> {
            Err(AppError::EmailTransport("connection refused".to_string()))
        }

        fn name(&self) -> &'static str {
            "failing"
        }
    }

    fn test_flow(dispatcher: Arc<dyn EmailDispatcher>) -> Arc<NotificationFlow> {
        let config = NotificationConfig {
            self_host: "notify.test.example".to_string(),
            template_folder: "emailtemplates".to_string(),
            contact_channel: "contactus".to_string(),
        };
        let templates = Arc::new(MemoryTemplateStore::new());
        templates.insert(Template {
            tenant: "acme".to_string(),
            channel: "welcome".to_string(),
            from: "no-reply@acme.example".to_string(),
            from_name: None,
            subject: "Hello".to_string(),
            fallback_to: None,
            blob: "welcome.html".to_string(),
        });
        let blobs = Arc::new(MemoryBlobStore::new());
        blobs.put("emailtemplates", "acme/welcome.html", "<p>Hi</p>");
        let renderer = Arc::new(TemplateRenderer::new(templates, blobs, config));
        Arc::new(NotificationFlow::new(renderer, dispatcher))
    }

    fn consumer(dispatcher: Arc<dyn EmailDispatcher>) -> (NotifyCommandConsumer, Arc<MemoryBroker>) {
        let broker = Arc::new(MemoryBroker::new());
        let flow = test_flow(dispatcher);
        let consumer = NotifyCommandConsumer::new(broker.clone(), flow, &BrokerConfig::default());
        (consumer, broker)
    }

    async fn publish_and_lease(broker: &MemoryBroker, topic: &str, payload: &str) -> LeasedMessage {
        broker.publish(topic, payload).await.unwrap();
        broker.lease(topic).await.unwrap().unwrap()
    }

    #[tokio::test]
    async fn test_undecodable_payload_is_acked() {
        let (consumer, broker) = consumer(Arc::new(LogDispatcher));
        let topic = consumer.topic.clone();

        let message = publish_and_lease(&broker, &topic, "not json").await;
        consumer.handle_message(message).await.unwrap();

        assert_eq!(broker.depth(&topic), 0);
        assert!(broker.lease(&topic).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_valid_command_is_delivered_and_acked() {
        let (consumer, broker) = consumer(Arc::new(LogDispatcher));
        let topic = consumer.topic.clone();
        let payload = serde_json::json!({
            "id": "6a2f1d9e-8f33-4e2e-b2c5-1f0f6d9a1b20",
            "tenant": "acme",
            "channel": "welcome",
            "destination": "alice@example.com",
            "parameters": {}
        })
        .to_string();

        let message = publish_and_lease(&broker, &topic, &payload).await;
        consumer.handle_message(message).await.unwrap();

        assert_eq!(consumer.flow.stats().delivered, 1);
        assert_eq!(broker.depth(&topic), 0);
    }

    #[tokio::test]
    async fn test_transport_failure_returns_message_to_topic() {
        let (consumer, broker) = consumer(Arc::new(FailingDispatcher));
        let topic = consumer.topic.clone();
        let payload = serde_json::json!({
            "id": "6a2f1d9e-8f33-4e2e-b2c5-1f0f6d9a1b20",
            "tenant": "acme",
            "channel": "welcome",
            "destination": "alice@example.com",
            "parameters": {}
        })
        .to_string();

        let message = publish_and_lease(&broker, &topic, &payload).await;
        consumer.handle_message(message).await.unwrap();

        let redelivered = broker.lease(&topic).await.unwrap().unwrap();
        assert_eq!(redelivered.attempts, 1);
    }

    #[tokio::test]
    async fn test_unknown_template_is_absorbed_and_acked() {
        let (consumer, broker) = consumer(Arc::new(LogDispatcher));
        let topic = consumer.topic.clone();
        let payload = serde_json::json!({
            "id": "6a2f1d9e-8f33-4e2e-b2c5-1f0f6d9a1b20",
            "tenant": "acme",
            "channel": "no-such-channel",
            "destination": "alice@example.com",
            "parameters": {}
        })
        .to_string();

        let message = publish_and_lease(&broker, &topic, &payload).await;
        consumer.handle_message(message).await.unwrap();

        assert_eq!(consumer.flow.stats().skipped, 1);
        assert_eq!(broker.depth(&topic), 0);
    }

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

    #[tokio::test]
    async fn test_poll_loop_survives_ack_failure() {
        let broker = Arc::new(FlakyAckBroker::new());
        let flow = test_flow(Arc::new(LogDispatcher));
        let config = BrokerConfig {
            poll_interval_ms: 10,
            ..BrokerConfig::default()
        };
        let consumer = Arc::new(NotifyCommandConsumer::new(broker.clone(), flow.clone(), &config));
        let shutdown = consumer.shutdown_signal();
        let consumer_clone = consumer.clone();
        let handle = tokio::spawn(async move { consumer_clone.start().await });

        for id in [
            "6a2f1d9e-8f33-4e2e-b2c5-1f0f6d9a1b20",
            "97b0e2a3-3a54-4f21-9c7e-55a1b3f8d410",
        ] {
            let payload = serde_json::json!({
                "id": id,
                "tenant": "acme",
                "channel": "welcome",
                "destination": "alice@example.com",
                "parameters": {}
            })
            .to_string();
            broker.publish(&config.notify_topic, &payload).await.unwrap();
        }

        // The first ack errors; the second command must still get through.
        for _ in 0..200 {
            if flow.stats().delivered >= 2 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(flow.stats().delivered, 2);
        assert!(!handle.is_finished());

        shutdown.send(()).unwrap();
        handle.await.unwrap().unwrap();
    }
}
