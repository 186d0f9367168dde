//! Subscription domain operations and change events.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;

use crate::error::Result;

use super::store::{SubscriptionStore, WriteOutcome};
use super::Subscription;

/// What a persistence write did to the row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Created,
    Updated,
}

/// A persistence change, forwarded to registered handlers.
#[derive(Debug, Clone)]
pub struct SubscriptionChanged {
    pub kind: ChangeKind,
    pub subscription: Subscription,
}

#[async_trait]
pub trait SubscriptionEventHandler: Send + Sync {
    async fn handle(&self, change: &SubscriptionChanged) -> Result<()>;
}

/// Validates nothing itself: field-level validation happens at the API
/// boundary and the domain trusts its inputs.
pub struct SubscriptionDomain {
    store: Arc<dyn SubscriptionStore>,
    handlers: Vec<Arc<dyn SubscriptionEventHandler>>,
}

impl SubscriptionDomain {
    pub fn new(
        store: Arc<dyn SubscriptionStore>,
        handlers: Vec<Arc<dyn SubscriptionEventHandler>>,
    ) -> Self {
        Self { store, handlers }
    }

    /// Persist subscription intent with replace-if-exists semantics.
    ///
    /// Re-subscribing overwrites the row: `subscribed_at` resets and any
    /// earlier `unsubscribed_at` clears.
    #[allow(clippy::too_many_arguments)]
    pub async fn subscribe(
        &self,
        tenant: &str,
        channel: &str,
        email: &str,
        first_name: &str,
        last_name: Option<&str>,
        source: Option<&str>,
        client_ip: Option<&str>,
    ) -> Result<()> {
        let subscription = Subscription {
            belonging: Subscription::build_belonging(tenant, channel),
            email: Subscription::build_row_key(email),
            first_name: first_name.to_string(),
            last_name: last_name.map(str::to_string),
            source: source.map(str::to_string),
            subscribed_at: Utc::now(),
            unsubscribed_at: None,
            client_ip: client_ip.map(str::to_string),
        };

        let outcome = self.store.upsert(subscription.clone()).await?;
        tracing::info!(
            belonging = %subscription.belonging,
            email = %subscription.email,
            outcome = ?outcome,
            "Subscription saved"
        );

        let kind = match outcome {
            WriteOutcome::Created => ChangeKind::Created,
            WriteOutcome::Updated => ChangeKind::Updated,
        };
        self.emit(SubscriptionChanged { kind, subscription }).await
    }

    /// Mark the subscription as unsubscribed.
    ///
    /// Unknown key is a no-op success; no record is created. A concurrent
    /// write on the same key surfaces as a conflict.
    pub async fn unsubscribe(&self, tenant: &str, channel: &str, email: &str) -> Result<()> {
        let belonging = Subscription::build_belonging(tenant, channel);
        let row_key = Subscription::build_row_key(email);

        let Some(row) = self.store.get(&belonging, &row_key).await? else {
            tracing::debug!(
                belonging = %belonging,
                email = %row_key,
                "Unsubscribe for unknown subscription, nothing to do"
            );
            return Ok(());
        };

        let mut subscription = row.subscription;
        subscription.unsubscribed_at = Some(Utc::now());
        self.store
            .update(subscription.clone(), row.version)
            .await?;
        tracing::info!(
            belonging = %subscription.belonging,
            email = %subscription.email,
            "Subscription unsubscribed"
        );

        self.emit(SubscriptionChanged {
            kind: ChangeKind::Updated,
            subscription,
        })
        .await
    }

    async fn emit(&self, change: SubscriptionChanged) -> Result<()> {
        for handler in &self.handlers {
            handler.handle(&change).await?;
        }
        Ok(())
    }
}
