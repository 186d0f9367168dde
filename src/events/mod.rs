//! Event-driven decoupling between subscription capture and welcome mail.
//!
//! A creation in the subscription store is adapted into a [`SubscribedEvent`]
//! on the broker; a consumer on the other side turns it into a welcome
//! notification. The subscribe request completes as soon as persistence and
//! publish succeed, without waiting on the email provider.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::broker::MessageBroker;
use crate::error::{AppError, Result};
use crate::notification::{NotificationFlow, NotifyCommand};
use crate::subscription::{
    ChangeKind, Subscription, SubscriptionChanged, SubscriptionEventHandler,
};
use crate::template::{ParamValue, Parameters};

/// Wire message carrying a full subscription snapshot, emitted once per
/// creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscribedEvent {
    pub subscription: Subscription,
}

/// Publishes a [`SubscribedEvent`] for every created subscription.
///
/// Updates (unsubscribe, re-subscribe overwrites) never republish.
pub struct SubscribedEventAdaptor {
    broker: Arc<dyn MessageBroker>,
    topic: String,
}

impl SubscribedEventAdaptor {
    pub fn new(broker: Arc<dyn MessageBroker>, topic: String) -> Self {
        Self { broker, topic }
    }
}

#[async_trait]
impl SubscriptionEventHandler for SubscribedEventAdaptor {
    async fn handle(&self, change: &SubscriptionChanged) -> Result<()> {
        if change.kind != ChangeKind::Created {
            return Ok(());
        }

        let event = SubscribedEvent {
            subscription: change.subscription.clone(),
        };
        let payload = serde_json::to_string(&event)
            .map_err(|e| AppError::Broker(format!("Cannot encode subscribed event: {}", e)))?;
        self.broker.publish(&self.topic, &payload).await?;
        tracing::debug!(
            subscription_id = %change.subscription.full_id(),
            topic = %self.topic,
            "Subscribed event published"
        );
        Ok(())
    }
}

/// Turns a consumed [`SubscribedEvent`] into a welcome notification.
pub struct GreetingsInitiator {
    flow: Arc<NotificationFlow>,
}

impl GreetingsInitiator {
    pub fn new(flow: Arc<NotificationFlow>) -> Self {
        Self { flow }
    }

    pub async fn handle(&self, event: &SubscribedEvent) -> Result<()> {
        self.flow
            .deliver(&Self::welcome_command(&event.subscription))
            .await
    }

    fn welcome_command(subscription: &Subscription) -> NotifyCommand {
        let last_name = subscription
            .last_name
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .map(|n| n.to_uppercase())
            .unwrap_or_default();
        NotifyCommand {
            id: Uuid::new_v4(),
            tenant: subscription.tenant().to_string(),
            channel: subscription.channel().to_string(),
            destination: Some(subscription.email.clone()),
            destination_display_name: None,
            parameters: Parameters::from([
                (
                    "FIRST_NAME".to_string(),
                    ParamValue::Scalar(subscription.first_name.to_uppercase()),
                ),
                ("LAST_NAME".to_string(), ParamValue::Scalar(last_name)),
            ]),
            token: None,
        }
    }
}
