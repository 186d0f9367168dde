//! SMTP dispatcher using lettre.
//!
//! Defaults suit local development against MailHog/Mailpit; production
//! relays enable TLS and credentials through configuration.

use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    Address, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};

use crate::config::SmtpConfig;
use crate::error::{AppError, Result};

use super::{EmailAddress, EmailDispatcher};

pub struct SmtpDispatcher {
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpDispatcher {
    pub fn new(config: &SmtpConfig) -> Result<Self> {
        let mut builder = if config.use_tls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
                .map_err(|e| AppError::EmailTransport(format!("SMTP relay setup: {}", e)))?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host)
        };
        builder = builder.port(config.port);

        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        Ok(Self {
            transport: builder.build(),
        })
    }

    fn mailbox(address: &EmailAddress) -> Result<Mailbox> {
        let parsed: Address = address
            .address
            .parse()
            .map_err(|e| AppError::EmailTransport(format!("Invalid address {}: {}", address.address, e)))?;
        Ok(Mailbox::new(address.display_name.clone(), parsed))
    }
}

#[async_trait]
impl EmailDispatcher for SmtpDispatcher {
    async fn send(
        &self,
        from: &EmailAddress,
        recipients: &[EmailAddress],
        subject: &str,
        body: &str,
    ) -> Result<bool> {
        let mut builder = Message::builder()
            .from(Self::mailbox(from)?)
            .subject(subject)
            .header(ContentType::TEXT_HTML);
        for recipient in recipients {
            builder = builder.to(Self::mailbox(recipient)?);
        }

        let message = builder
            .body(body.to_string())
            .map_err(|e| AppError::EmailTransport(format!("Cannot build message: {}", e)))?;

        let response = self
            .transport
            .send(message)
            .await
            .map_err(|e| AppError::EmailTransport(format!("SMTP send: {}", e)))?;

        tracing::debug!(
            code = %response.code(),
            positive = response.is_positive(),
            "SMTP server response"
        );
        Ok(response.is_positive())
    }

    fn name(&self) -> &'static str {
        "smtp"
    }
}
