//! Email dispatcher factory.

use std::sync::Arc;

use crate::config::EmailConfig;
use crate::error::Result;

use super::sendgrid::SendGridDispatcher;
use super::smtp::SmtpDispatcher;
use super::{EmailDispatcher, LogDispatcher};

/// Create an email dispatcher based on configuration.
///
/// Supported backends: `"smtp"`, `"sendgrid"`; anything else falls back to
/// the log-only dispatcher.
pub fn create_email_dispatcher(config: &EmailConfig) -> Result<Arc<dyn EmailDispatcher>> {
    match config.backend.as_str() {
        "smtp" => {
            tracing::info!(
                backend = "smtp",
                host = %config.smtp.host,
                port = config.smtp.port,
                "Creating SMTP email dispatcher"
            );
            Ok(Arc::new(SmtpDispatcher::new(&config.smtp)?))
        }
        "sendgrid" => {
            tracing::info!(backend = "sendgrid", "Creating SendGrid email dispatcher");
            Ok(Arc::new(SendGridDispatcher::new(&config.sendgrid)?))
        }
        other => {
            if other != "log" {
                tracing::warn!(
                    backend = %other,
                    "Unknown email backend, falling back to log dispatcher"
                );
            } else {
                tracing::info!(backend = "log", "Creating log email dispatcher");
            }
            Ok(Arc::new(LogDispatcher))
        }
    }
}
