//! Email dispatch backends.
//!
//! The flow talks to a narrow [`EmailDispatcher`] seam; backends are
//! selected by the factory from configuration.

mod factory;
mod sendgrid;
mod smtp;

pub use factory::create_email_dispatcher;
pub use sendgrid::SendGridDispatcher;
pub use smtp::SmtpDispatcher;

use async_trait::async_trait;

use crate::error::Result;

/// An address with an optional display name.
#[derive(Debug, Clone, PartialEq)]
pub struct EmailAddress {
    pub address: String,
    pub display_name: Option<String>,
}

impl EmailAddress {
    pub fn new(address: impl Into<String>, display_name: Option<String>) -> Self {
        Self {
            address: address.into(),
            display_name,
        }
    }
}

/// Sends a rendered message.
///
/// `Ok(false)` means the provider accepted the call but rejected the
/// message; transport failures surface as errors.
#[async_trait]
pub trait EmailDispatcher: Send + Sync {
    async fn send(
        &self,
        from: &EmailAddress,
        recipients: &[EmailAddress],
        subject: &str,
        body: &str,
    ) -> Result<bool>;

    /// Backend name for logging.
    fn name(&self) -> &'static str;
}

/// Dispatcher that only logs; the development default.
#[derive(Default)]
pub struct LogDispatcher;

#[async_trait]
impl EmailDispatcher for LogDispatcher {
    async fn send(
        &self,
        from: &EmailAddress,
        recipients: &[EmailAddress],
        subject: &str,
        body: &str,
    ) -> Result<bool> {
        tracing::info!(
            from = %from.address,
            to = ?recipients.iter().map(|r| r.address.as_str()).collect::<Vec<_>>(),
            subject = %subject,
            body_bytes = body.len(),
            "Email dispatch (log backend)"
        );
        Ok(true)
    }

    fn name(&self) -> &'static str {
        "log"
    }
}
