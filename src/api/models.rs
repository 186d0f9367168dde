use serde::Deserialize;

use crate::error::{AppError, Result};

const MAX_NAME_LEN: usize = 50;
const MAX_CHANNEL_LEN: usize = 30;
const MAX_EMAIL_LEN: usize = 50;
const MAX_CAPTCHA_LEN: usize = 5000;
const MAX_MESSAGE_LEN: usize = 3000;

/// Anonymous subscribe request.
#[derive(Debug, Clone, Deserialize)]
pub struct SubscribeCommand {
    pub tenant: String,
    #[serde(alias = "campaign")]
    pub channel: String,
    pub email: String,
    pub first_name: String,
    pub last_name: Option<String>,
    /// Free-form attribution tag recorded on the subscription
    pub track: Option<String>,
    pub captcha: Option<String>,
}

impl SubscribeCommand {
    /// Trim every field and canonicalize the email to lowercase.
    pub fn sanitize(&mut self) {
        self.tenant = self.tenant.trim().to_string();
        self.channel = self.channel.trim().to_string();
        self.email = self.email.trim().to_lowercase();
        self.first_name = self.first_name.trim().to_string();
        self.last_name = self
            .last_name
            .take()
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty());
        self.track = self
            .track
            .take()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());
    }

    pub fn validate(&self) -> Result<()> {
        if self.tenant.is_empty() {
            return Err(AppError::Validation("Tenant is required".to_string()));
        }
        if self.channel.is_empty() || self.channel.len() > MAX_CHANNEL_LEN {
            return Err(AppError::Validation("Invalid channel".to_string()));
        }
        if self.email.is_empty() || self.email.len() > MAX_EMAIL_LEN || !self.email.contains('@') {
            return Err(AppError::Validation("Invalid email address".to_string()));
        }
        if self.first_name.is_empty() || self.first_name.len() > MAX_NAME_LEN {
            return Err(AppError::Validation("Invalid first name".to_string()));
        }
        if let Some(last_name) = &self.last_name {
            if last_name.len() > MAX_NAME_LEN {
                return Err(AppError::Validation("Invalid last name".to_string()));
            }
        }
        if let Some(captcha) = &self.captcha {
            if captcha.len() > MAX_CAPTCHA_LEN {
                return Err(AppError::Validation("Invalid captcha token".to_string()));
            }
        }
        Ok(())
    }
}

/// Contact-us request, relayed to the tenant through its contact template.
#[derive(Debug, Clone, Deserialize)]
pub struct ContactUsRequest {
    pub tenant: String,
    pub message: String,
    /// Visitor-supplied display name, free text
    pub name: Option<String>,
    /// Visitor-supplied reply address or phone, free text
    pub contact: Option<String>,
    pub token: String,
}

impl ContactUsRequest {
    pub fn validate(&self) -> Result<()> {
        if self.tenant.trim().is_empty() {
            return Err(AppError::Validation("Tenant is required".to_string()));
        }
        if self.message.trim().is_empty() || self.message.len() > MAX_MESSAGE_LEN {
            return Err(AppError::Validation("Invalid message".to_string()));
        }
        if self.token.trim().is_empty() || self.token.len() > MAX_CAPTCHA_LEN {
            return Err(AppError::Validation("Invalid captcha token".to_string()));
        }
        Ok(())
    }
}
