//! Cross-component integration tests
//!
//! These tests wire the real domain, broker and delivery flow together in
//! memory and drive the consumer loops, without Redis or server startup.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use herald_notification_service::broker::{MemoryBroker, MessageBroker};
use herald_notification_service::config::{BrokerConfig, NotificationConfig};
use herald_notification_service::email::{EmailAddress, EmailDispatcher};
use herald_notification_service::error::Result;
use herald_notification_service::events::{GreetingsInitiator, SubscribedEventAdaptor};
use herald_notification_service::notification::NotificationFlow;
use herald_notification_service::subscription::{
    MemorySubscriptionStore, SubscriptionDomain, SubscriptionEventHandler,
};
use herald_notification_service::template::{
    MemoryBlobStore, MemoryTemplateStore, Template, TemplateRenderer,
};
use herald_notification_service::triggers::{
    NotifyCommandConsumer, SubscribeCommandConsumer, SubscribedEventConsumer,
};

#[derive(Debug, Clone)]
struct SentMail {
    to: String,
    subject: String,
    body: String,
}

#[derive(Default)]
struct RecordingDispatcher {
    sent: Mutex<Vec<SentMail>>,
}

impl RecordingDispatcher {
    fn sent(&self) -> Vec<SentMail> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl EmailDispatcher for RecordingDispatcher {
    async fn send(
        &self,
        _from: &EmailAddress,
        recipients: &[EmailAddress],
        subject: &str,
        body: &str,
    ) -> Result<bool> {
        self.sent.lock().unwrap().push(SentMail {
            to: recipients[0].address.clone(),
            subject: subject.to_string(),
            body: body.to_string(),
        });
        Ok(true)
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}

struct TestEnvironment {
    broker: Arc<MemoryBroker>,
    broker_config: BrokerConfig,
    dispatcher: Arc<RecordingDispatcher>,
    flow: Arc<NotificationFlow>,
    subscriptions: Arc<SubscriptionDomain>,
    greetings: Arc<GreetingsInitiator>,
}

fn create_test_environment() -> TestEnvironment {
    let config = NotificationConfig {
        self_host: "notify.test.example".to_string(),
        template_folder: "emailtemplates".to_string(),
        contact_channel: "contactus".to_string(),
    };

    let templates = Arc::new(MemoryTemplateStore::new());
    templates.insert(Template {
        tenant: "acme.example".to_string(),
        channel: "welcome".to_string(),
        from: "no-reply@acme.example".to_string(),
        from_name: Some("Acme".to_string()),
        subject: "Welcome, {{FIRST_NAME}}!".to_string(),
        fallback_to: None,
        blob: "welcome.html".to_string(),
    });
    let blobs = Arc::new(MemoryBlobStore::new());
    blobs.put(
        "emailtemplates",
        "acme.example/welcome.html",
        "<p>Hello {{FIRST_NAME}} {{LAST_NAME}}</p><a href=\"{{UNSUBSCRIBE_LINK}}\">bye</a>",
    );

    let dispatcher = Arc::new(RecordingDispatcher::default());
    let renderer = Arc::new(TemplateRenderer::new(templates, blobs, config));
    let flow = Arc::new(NotificationFlow::new(renderer, dispatcher.clone()));

    let broker = Arc::new(MemoryBroker::new());
    let broker_config = BrokerConfig {
        poll_interval_ms: 10,
        ..BrokerConfig::default()
    };

    let adaptor: Arc<dyn SubscriptionEventHandler> = Arc::new(SubscribedEventAdaptor::new(
        broker.clone(),
        broker_config.subscribed_topic.clone(),
    ));
    let subscriptions = Arc::new(SubscriptionDomain::new(
        Arc::new(MemorySubscriptionStore::new()),
        vec![adaptor],
    ));
    let greetings = Arc::new(GreetingsInitiator::new(flow.clone()));

    TestEnvironment {
        broker,
        broker_config,
        dispatcher,
        flow,
        subscriptions,
        greetings,
    }
}

async fn wait_for_sent(dispatcher: &RecordingDispatcher, count: usize) -> Vec<SentMail> {
    for _ in 0..200 {
        let sent = dispatcher.sent();
        if sent.len() >= count {
            return sent;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    dispatcher.sent()
}

#[tokio::test]
async fn test_subscribe_triggers_welcome_email() {
    let env = create_test_environment();

    let consumer = Arc::new(SubscribedEventConsumer::new(
        env.broker.clone(),
        env.greetings.clone(),
        &env.broker_config,
    ));
    let shutdown = consumer.shutdown_signal();
    let consumer_clone = consumer.clone();
    let handle = tokio::spawn(async move { consumer_clone.start().await });

    env.subscriptions
        .subscribe(
            "acme.example",
            "welcome",
            "Alice@Example.COM",
            "Alice",
            Some("Smith"),
            Some("landing-page"),
            None,
        )
        .await
        .unwrap();

    let sent = wait_for_sent(&env.dispatcher, 1).await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, "alice@example.com");
    assert_eq!(sent[0].subject, "Welcome, ALICE!");
    assert!(sent[0].body.contains("Hello ALICE SMITH"));
    assert!(sent[0]
        .body
        .contains("https://notify.test.example/unsubscribe?email=alice%40example.com"));

    shutdown.send(()).unwrap();
    handle.await.unwrap().unwrap();
    assert_eq!(env.broker.depth(&env.broker_config.subscribed_topic), 0);
}

#[tokio::test]
async fn test_resubscribe_does_not_send_second_welcome() {
    let env = create_test_environment();

    let consumer = Arc::new(SubscribedEventConsumer::new(
        env.broker.clone(),
        env.greetings.clone(),
        &env.broker_config,
    ));
    let shutdown = consumer.shutdown_signal();
    let consumer_clone = consumer.clone();
    let handle = tokio::spawn(async move { consumer_clone.start().await });

    for _ in 0..2 {
        env.subscriptions
            .subscribe(
                "acme.example",
                "welcome",
                "alice@example.com",
                "Alice",
                None,
                None,
                None,
            )
            .await
            .unwrap();
    }

    let sent = wait_for_sent(&env.dispatcher, 1).await;
    assert_eq!(sent.len(), 1);

    // The second subscribe is an update; nothing new may arrive.
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(env.dispatcher.sent().len(), 1);
    assert_eq!(env.broker.depth(&env.broker_config.subscribed_topic), 0);

    shutdown.send(()).unwrap();
    handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_unsubscribe_publishes_no_event() {
    let env = create_test_environment();

    env.subscriptions
        .subscribe(
            "acme.example",
            "welcome",
            "alice@example.com",
            "Alice",
            None,
            None,
            None,
        )
        .await
        .unwrap();
    // Drain the creation event.
    let leased = env
        .broker
        .lease(&env.broker_config.subscribed_topic)
        .await
        .unwrap()
        .unwrap();
    env.broker
        .ack(&env.broker_config.subscribed_topic, leased.id)
        .await
        .unwrap();

    env.subscriptions
        .unsubscribe("acme.example", "welcome", "alice@example.com")
        .await
        .unwrap();

    assert_eq!(env.broker.depth(&env.broker_config.subscribed_topic), 0);
}

#[tokio::test]
async fn test_queued_subscribe_command_flows_to_welcome_email() {
    let env = create_test_environment();

    let subscribe_consumer = Arc::new(SubscribeCommandConsumer::new(
        env.broker.clone(),
        env.subscriptions.clone(),
        &env.broker_config,
    ));
    let subscribe_shutdown = subscribe_consumer.shutdown_signal();
    let subscribe_clone = subscribe_consumer.clone();
    let subscribe_handle = tokio::spawn(async move { subscribe_clone.start().await });

    let subscribed_consumer = Arc::new(SubscribedEventConsumer::new(
        env.broker.clone(),
        env.greetings.clone(),
        &env.broker_config,
    ));
    let subscribed_shutdown = subscribed_consumer.shutdown_signal();
    let subscribed_clone = subscribed_consumer.clone();
    let subscribed_handle = tokio::spawn(async move { subscribed_clone.start().await });

    let payload = json!({
        "tenant": "acme.example",
        "campaign": "welcome",
        "email": "Carol@Example.COM",
        "first_name": "Carol"
    })
    .to_string();
    env.broker
        .publish(&env.broker_config.subscribe_topic, &payload)
        .await
        .unwrap();

    let sent = wait_for_sent(&env.dispatcher, 1).await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, "carol@example.com");
    assert_eq!(sent[0].subject, "Welcome, CAROL!");

    subscribe_shutdown.send(()).unwrap();
    subscribed_shutdown.send(()).unwrap();
    subscribe_handle.await.unwrap().unwrap();
    subscribed_handle.await.unwrap().unwrap();
    assert_eq!(env.broker.depth(&env.broker_config.subscribe_topic), 0);
    assert_eq!(env.broker.depth(&env.broker_config.subscribed_topic), 0);
}

#[tokio::test]
async fn test_queued_notify_command_is_delivered() {
    let env = create_test_environment();

    let consumer = Arc::new(NotifyCommandConsumer::new(
        env.broker.clone(),
        env.flow.clone(),
        &env.broker_config,
    ));
    let shutdown = consumer.shutdown_signal();
    let consumer_clone = consumer.clone();
    let handle = tokio::spawn(async move { consumer_clone.start().await });

    let payload = json!({
        "id": "97b0e2a3-3a54-4f21-9c7e-55a1b3f8d410",
        "tenant": "acme.example",
        "channel": "welcome",
        "destination": "bob@example.com",
        "parameters": {"FIRST_NAME": "Bob", "LAST_NAME": "Jones"}
    })
    .to_string();
    env.broker
        .publish(&env.broker_config.notify_topic, &payload)
        .await
        .unwrap();

    let sent = wait_for_sent(&env.dispatcher, 1).await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, "bob@example.com");
    assert!(sent[0].body.contains("Hello Bob Jones"));
    assert_eq!(env.flow.stats().delivered, 1);

    shutdown.send(()).unwrap();
    handle.await.unwrap().unwrap();
    assert_eq!(env.broker.depth(&env.broker_config.notify_topic), 0);
}
