//! Delivery orchestration: resolve and render the template, then hand the
//! result to the email dispatcher.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;

use crate::email::{EmailAddress, EmailDispatcher};
use crate::error::{AppError, Result};
use crate::template::{TemplateKey, TemplateRenderer};

use super::NotifyCommand;

/// Counters for delivered, skipped and failed notifications.
#[derive(Debug, Default)]
struct FlowStats {
    delivered: AtomicU64,
    skipped: AtomicU64,
    failed: AtomicU64,
}

/// Snapshot of flow statistics
#[derive(Debug, Clone, Serialize)]
pub struct FlowStatsSnapshot {
    pub delivered: u64,
    pub skipped: u64,
    pub failed: u64,
}

/// Orchestrates rendering and dispatch for one notification command.
///
/// A tenant without a template for the channel is not an error: the command
/// is skipped silently so the triggering event still completes.
pub struct NotificationFlow {
    renderer: Arc<TemplateRenderer>,
    dispatcher: Arc<dyn EmailDispatcher>,
    stats: FlowStats,
}

impl NotificationFlow {
    pub fn new(renderer: Arc<TemplateRenderer>, dispatcher: Arc<dyn EmailDispatcher>) -> Self {
        Self {
            renderer,
            dispatcher,
            stats: FlowStats::default(),
        }
    }

    pub fn stats(&self) -> FlowStatsSnapshot {
        FlowStatsSnapshot {
            delivered: self.stats.delivered.load(Ordering::Relaxed),
            skipped: self.stats.skipped.load(Ordering::Relaxed),
            failed: self.stats.failed.load(Ordering::Relaxed),
        }
    }

    #[tracing::instrument(
        name = "flow.deliver",
        skip(self, command),
        fields(
            command_id = %command.id,
            tenant = %command.tenant,
            channel = %command.channel
        )
    )]
    pub async fn deliver(&self, command: &NotifyCommand) -> Result<()> {
        let key = TemplateKey::new(command.tenant.clone(), &command.channel);
        let Some(mut deliverable) = self
            .renderer
            .render(&key, command.destination.as_deref(), &command.parameters)
            .await?
        else {
            self.stats.skipped.fetch_add(1, Ordering::Relaxed);
            tracing::debug!("No template configured for channel, skipping delivery");
            return Ok(());
        };

        // Defense in depth; the renderer already rejects blank subjects.
        if deliverable.subject.trim().is_empty() {
            return Err(AppError::Configuration(
                "Subject is required for email notification".to_string(),
            ));
        }

        deliverable.to_name = command.destination_display_name.clone();

        let from = EmailAddress::new(deliverable.from.clone(), deliverable.from_name.clone());
        let to = EmailAddress::new(deliverable.to.clone(), deliverable.to_name.clone());

        // Dispatcher errors propagate unchanged; logging them here would
        // duplicate the transport's own report.
        let success = match self
            .dispatcher
            .send(&from, &[to], &deliverable.subject, &deliverable.body)
            .await
        {
            Ok(success) => success,
            Err(e) => {
                self.stats.failed.fetch_add(1, Ordering::Relaxed);
                return Err(e);
            }
        };

        if !success {
            self.stats.failed.fetch_add(1, Ordering::Relaxed);
            tracing::error!(
                destination = %deliverable.to,
                channel = %command.channel,
                "Failed sending email"
            );
            return Err(AppError::Delivery(format!(
                "Failed sending email to {} for {} by {}",
                deliverable.to, command.channel, command.tenant
            )));
        }

        self.stats.delivered.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(
            destination = %deliverable.to,
            dispatcher = self.dispatcher.name(),
            "Notification delivered"
        );
        Ok(())
    }
}
