//! SendGrid dispatcher using the v3 mail/send HTTP API.

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;

use crate::config::SendGridConfig;
use crate::error::{AppError, Result};

use super::{EmailAddress, EmailDispatcher};

pub struct SendGridDispatcher {
    api_key: String,
    api_url: String,
    client: Client,
}

impl SendGridDispatcher {
    pub fn new(config: &SendGridConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| AppError::Configuration("SendGrid API key is not set".to_string()))?;
        Ok(Self {
            api_key,
            api_url: config.api_url.clone(),
            client: Client::new(),
        })
    }
}

#[derive(Debug, Serialize)]
struct SendGridRequest {
    personalizations: Vec<Personalization>,
    from: Address,
    subject: String,
    content: Vec<Content>,
}

#[derive(Debug, Serialize)]
struct Personalization {
    to: Vec<Address>,
}

#[derive(Debug, Serialize)]
struct Address {
    email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
}

#[derive(Debug, Serialize)]
struct Content {
    #[serde(rename = "type")]
    content_type: String,
    value: String,
}

impl From<&EmailAddress> for Address {
    fn from(address: &EmailAddress) -> Self {
        Self {
            email: address.address.clone(),
            name: address.display_name.clone(),
        }
    }
}

#[async_trait]
impl EmailDispatcher for SendGridDispatcher {
    async fn send(
        &self,
        from: &EmailAddress,
        recipients: &[EmailAddress],
        subject: &str,
        body: &str,
    ) -> Result<bool> {
        let request = SendGridRequest {
            personalizations: vec![Personalization {
                to: recipients.iter().map(Address::from).collect(),
            }],
            from: Address::from(from),
            subject: subject.to_string(),
            content: vec![Content {
                content_type: "text/html".to_string(),
                value: body.to_string(),
            }],
        };

        let response = self
            .client
            .post(format!("{}/mail/send", self.api_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| AppError::EmailTransport(format!("SendGrid request: {}", e)))?;

        let status = response.status();
        if status.is_success() {
            return Ok(true);
        }

        // The API answered but rejected the message; the flow decides
        // whether that is fatal.
        let detail = response.text().await.unwrap_or_default();
        tracing::warn!(
            status = %status,
            detail = %detail,
            "SendGrid rejected the message"
        );
        Ok(false)
    }

    fn name(&self) -> &'static str {
        "sendgrid"
    }
}
