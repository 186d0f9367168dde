//! Subscription persistence seam.
//!
//! Per-entity consistency is the store's job: writes carry a version and a
//! mismatch is rejected, surfacing to the caller. The domain never retries.

use async_trait::async_trait;
use dashmap::DashMap;

use crate::error::{AppError, Result};

use super::Subscription;

/// Whether an upsert created a new row or replaced an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Created,
    Updated,
}

/// A subscription row together with its storage version.
#[derive(Debug, Clone)]
pub struct VersionedSubscription {
    pub subscription: Subscription,
    pub version: u64,
}

#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    async fn get(&self, belonging: &str, email: &str) -> Result<Option<VersionedSubscription>>;

    /// Replace-if-exists write; reports whether a row was created.
    async fn upsert(&self, subscription: Subscription) -> Result<WriteOutcome>;

    /// Versioned update; a version mismatch is a write conflict.
    async fn update(&self, subscription: Subscription, expected_version: u64) -> Result<()>;
}

/// In-memory subscription store.
#[derive(Default)]
pub struct MemorySubscriptionStore {
    rows: DashMap<(String, String), VersionedSubscription>,
}

impl MemorySubscriptionStore {
    pub fn new() -> Self {
        Self {
            rows: DashMap::new(),
        }
    }

    pub fn count(&self) -> usize {
        self.rows.len()
    }

    fn key(subscription: &Subscription) -> (String, String) {
        (
            subscription.belonging.clone(),
            subscription.email.clone(),
        )
    }
}

#[async_trait]
impl SubscriptionStore for MemorySubscriptionStore {
    async fn get(&self, belonging: &str, email: &str) -> Result<Option<VersionedSubscription>> {
        Ok(self
            .rows
            .get(&(belonging.to_string(), email.to_string()))
            .map(|row| row.clone()))
    }

    async fn upsert(&self, subscription: Subscription) -> Result<WriteOutcome> {
        let key = Self::key(&subscription);
        match self.rows.entry(key) {
            dashmap::mapref::entry::Entry::Occupied(mut occupied) => {
                let version = occupied.get().version + 1;
                occupied.insert(VersionedSubscription {
                    subscription,
                    version,
                });
                Ok(WriteOutcome::Updated)
            }
            dashmap::mapref::entry::Entry::Vacant(vacant) => {
                vacant.insert(VersionedSubscription {
                    subscription,
                    version: 1,
                });
                Ok(WriteOutcome::Created)
            }
        }
    }

    async fn update(&self, subscription: Subscription, expected_version: u64) -> Result<()> {
        let key = Self::key(&subscription);
        let Some(mut row) = self.rows.get_mut(&key) else {
            return Err(AppError::Conflict(format!(
                "Subscription {} no longer exists",
                subscription.full_id()
            )));
        };
        if row.version != expected_version {
            return Err(AppError::Conflict(format!(
                "Subscription {} was modified concurrently",
                subscription.full_id()
            )));
        }
        row.version += 1;
        row.subscription = subscription;
        Ok(())
    }
}
