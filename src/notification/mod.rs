//! Notification commands and the delivery flow.

mod flow;

pub use flow::{FlowStatsSnapshot, NotificationFlow};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::template::Parameters;

const MAX_NAME_LEN: usize = 50;
const MAX_TOKEN_LEN: usize = 5000;

/// A request to deliver one templated notification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyCommand {
    pub id: Uuid,
    pub tenant: String,
    pub channel: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination_display_name: Option<String>,
    pub parameters: Parameters,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

impl NotifyCommand {
    pub fn validate(&self) -> Result<()> {
        if self.tenant.trim().is_empty() {
            return Err(AppError::Validation("Tenant is required".to_string()));
        }
        if self.channel.trim().is_empty() {
            return Err(AppError::Validation("Channel is required".to_string()));
        }
        if self.tenant.len() > MAX_NAME_LEN || self.channel.len() > MAX_NAME_LEN {
            return Err(AppError::Validation(
                "Tenant or channel exceeds the length limit".to_string(),
            ));
        }
        if let Some(destination) = &self.destination {
            if destination.len() > MAX_NAME_LEN {
                return Err(AppError::Validation(
                    "Destination exceeds the length limit".to_string(),
                ));
            }
        }
        if let Some(token) = &self.token {
            if token.len() > MAX_TOKEN_LEN {
                return Err(AppError::Validation(
                    "Token exceeds the length limit".to_string(),
                ));
            }
        }
        Ok(())
    }
}
