//! Subscription capture: model, storage seam and domain operations.

mod domain;
mod store;

pub use domain::{
    ChangeKind, SubscriptionChanged, SubscriptionDomain, SubscriptionEventHandler,
};
pub use store::{MemorySubscriptionStore, SubscriptionStore, VersionedSubscription, WriteOutcome};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

const BELONGING_SEPARATOR: char = '|';

/// A subscriber within one tenant's channel.
///
/// Keyed by (`belonging` = `tenant|channel`, lowercased email). Created on
/// subscribe, mutated only by unsubscribe, never deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subscription {
    pub belonging: String,
    pub email: String,
    pub first_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    pub subscribed_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unsubscribed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_ip: Option<String>,
}

impl Subscription {
    pub fn build_belonging(tenant: &str, channel: &str) -> String {
        format!("{}{}{}", tenant.trim(), BELONGING_SEPARATOR, channel.trim())
    }

    pub fn build_row_key(email: &str) -> String {
        email.trim().to_lowercase()
    }

    pub fn tenant(&self) -> &str {
        self.belonging
            .split_once(BELONGING_SEPARATOR)
            .map(|(tenant, _)| tenant)
            .unwrap_or(&self.belonging)
    }

    pub fn channel(&self) -> &str {
        self.belonging
            .split_once(BELONGING_SEPARATOR)
            .map(|(_, channel)| channel)
            .unwrap_or_default()
    }

    pub fn full_id(&self) -> String {
        format!("{}{}{}", self.belonging, BELONGING_SEPARATOR, self.email)
    }
}
