use std::sync::Arc;

use crate::broker::{create_broker, MessageBroker};
use crate::config::Settings;
use crate::email::create_email_dispatcher;
use crate::error::Result;
use crate::events::{GreetingsInitiator, SubscribedEventAdaptor};
use crate::notification::NotificationFlow;
use crate::risk::{create_risk_assessor, RiskAssessor};
use crate::subscription::{MemorySubscriptionStore, SubscriptionDomain, SubscriptionEventHandler};
use crate::template::{
    BlobStore, FsBlobStore, MemoryBlobStore, MemoryTemplateStore, TemplateRenderer,
};

#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub broker: Arc<dyn MessageBroker>,
    pub flow: Arc<NotificationFlow>,
    pub subscriptions: Arc<SubscriptionDomain>,
    pub greetings: Arc<GreetingsInitiator>,
    pub risk: Arc<dyn RiskAssessor>,
}

impl AppState {
    pub async fn new(settings: Settings) -> Result<Self> {
        let templates = match &settings.storage.templates_file {
            Some(path) => Arc::new(MemoryTemplateStore::from_file(path).await?),
            None => Arc::new(MemoryTemplateStore::new()),
        };
        let blobs: Arc<dyn BlobStore> = match &settings.storage.blob_root {
            Some(root) => Arc::new(FsBlobStore::new(root.clone())),
            None => Arc::new(MemoryBlobStore::new()),
        };

        let broker = create_broker(&settings.broker).await?;
        let dispatcher = create_email_dispatcher(&settings.email)?;
        let renderer = Arc::new(TemplateRenderer::new(
            templates,
            blobs,
            settings.notification.clone(),
        ));
        let flow = Arc::new(NotificationFlow::new(renderer, dispatcher));

        let adaptor: Arc<dyn SubscriptionEventHandler> = Arc::new(SubscribedEventAdaptor::new(
            broker.clone(),
            settings.broker.subscribed_topic.clone(),
        ));
        let subscriptions = Arc::new(SubscriptionDomain::new(
            Arc::new(MemorySubscriptionStore::new()),
            vec![adaptor],
        ));
        let greetings = Arc::new(GreetingsInitiator::new(flow.clone()));
        let risk = create_risk_assessor(&settings.risk);

        Ok(Self {
            settings: Arc::new(settings),
            broker,
            flow,
            subscriptions,
            greetings,
            risk,
        })
    }
}
