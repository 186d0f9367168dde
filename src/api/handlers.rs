use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::notification::NotifyCommand;
use crate::server::AppState;
use crate::template::{ParamValue, Parameters};

use super::models::{ContactUsRequest, SubscribeCommand};

const UNSUBSCRIBED_MESSAGE: &str =
    "You've been successfully unsubscribed from this mailing list.";

#[derive(Debug, Serialize)]
pub struct AcceptedResponse {
    pub accepted: bool,
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
}

/// Accept a notify command and queue it for asynchronous delivery.
pub async fn enqueue_notification(
    State(state): State<AppState>,
    Json(command): Json<NotifyCommand>,
) -> Result<(StatusCode, Json<AcceptedResponse>)> {
    command.validate()?;

    let payload = serde_json::to_string(&command)
        .map_err(|e| AppError::Broker(format!("Cannot encode notify command: {}", e)))?;
    state
        .broker
        .publish(&state.settings.broker.notify_topic, &payload)
        .await?;

    tracing::debug!(command_id = %command.id, channel = %command.channel, "Notify command queued");
    Ok((
        StatusCode::ACCEPTED,
        Json(AcceptedResponse {
            accepted: true,
            id: command.id,
            timestamp: Utc::now(),
        }),
    ))
}

#[derive(Debug, Serialize)]
pub struct SubscribeResponse {
    pub status: String,
}

/// Record subscription intent after a risk check on the visitor.
pub async fn subscribe(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(mut command): Json<SubscribeCommand>,
) -> Result<Json<SubscribeResponse>> {
    command.sanitize();
    command.validate()?;

    let client_ip = client_ip(&headers);
    let token = command.captcha.as_deref().ok_or(AppError::RiskRejected)?;
    let accepted = state
        .risk
        .assess(token, &state.settings.notification.self_host, client_ip.as_deref())
        .await?;
    if !accepted {
        return Err(AppError::RiskRejected);
    }

    state
        .subscriptions
        .subscribe(
            &command.tenant,
            &command.channel,
            &command.email,
            &command.first_name,
            command.last_name.as_deref(),
            command.track.as_deref(),
            client_ip.as_deref(),
        )
        .await?;

    Ok(Json(SubscribeResponse {
        status: "subscribed".to_string(),
    }))
}

#[derive(Debug, Deserialize)]
pub struct UnsubscribeQuery {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub tenant: String,
    #[serde(default)]
    pub channel: String,
}

/// One-click unsubscribe target of the links embedded in every email.
pub async fn unsubscribe(
    State(state): State<AppState>,
    Query(query): Query<UnsubscribeQuery>,
) -> Result<String> {
    if query.email.trim().is_empty()
        || query.tenant.trim().is_empty()
        || query.channel.trim().is_empty()
    {
        return Err(AppError::Validation(
            "email, tenant and channel are required".to_string(),
        ));
    }

    state
        .subscriptions
        .unsubscribe(&query.tenant, &query.channel, &query.email)
        .await?;

    Ok(UNSUBSCRIBED_MESSAGE.to_string())
}

/// Relay a contact-us message to the tenant through its contact template.
pub async fn contact(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<ContactUsRequest>,
) -> Result<StatusCode> {
    request.validate()?;

    let client_ip = client_ip(&headers);
    let accepted = state
        .risk
        .assess(
            &request.token,
            &state.settings.notification.self_host,
            client_ip.as_deref(),
        )
        .await?;
    if !accepted {
        return Err(AppError::RiskRejected);
    }

    let command = NotifyCommand {
        id: Uuid::new_v4(),
        tenant: request.tenant.trim().to_string(),
        channel: state.settings.notification.contact_channel.clone(),
        destination: None,
        destination_display_name: None,
        parameters: Parameters::from([
            ("NAME".to_string(), scalar_or_unspecified(request.name)),
            ("CONTACT".to_string(), scalar_or_unspecified(request.contact)),
            (
                "MESSAGE".to_string(),
                ParamValue::Scalar(request.message.trim().to_string()),
            ),
        ]),
        token: None,
    };
    state.flow.deliver(&command).await?;

    Ok(StatusCode::CREATED)
}

fn scalar_or_unspecified(value: Option<String>) -> ParamValue {
    let value = value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| "unspecified".to_string());
    ParamValue::Scalar(value)
}

/// First address of X-Forwarded-For, when the proxy supplies one.
fn client_ip(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
