use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Settings error: {0}")]
    Settings(#[from] config::ConfigError),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Delivery error: {0}")]
    Delivery(String),

    #[error("Write conflict: {0}")]
    Conflict(String),

    #[error("Broker error: {0}")]
    Broker(String),

    #[error("Email transport error: {0}")]
    EmailTransport(String),

    #[error("Risk assessment rejected the request")]
    RiskRejected,

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),
}

#[derive(Serialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Serialize)]
struct ErrorBody {
    code: String,
    message: String,
}

/// Check if running in production mode (based on RUN_MODE env var)
fn is_production() -> bool {
    std::env::var("RUN_MODE")
        .map(|m| m == "production" || m == "prod")
        .unwrap_or(false)
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, client_message, log_message) = match &self {
            AppError::Validation(msg) => (
                StatusCode::BAD_REQUEST,
                "VALIDATION_ERROR",
                msg.clone(),
                msg.clone(),
            ),
            AppError::NotFound(msg) => {
                (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone(), msg.clone())
            }
            AppError::Conflict(msg) => {
                (StatusCode::CONFLICT, "WRITE_CONFLICT", msg.clone(), msg.clone())
            }
            AppError::RiskRejected => (
                StatusCode::FORBIDDEN,
                "FORBIDDEN",
                "Request rejected".to_string(),
                self.to_string(),
            ),
            AppError::Settings(e) => {
                let log_msg = e.to_string();
                let client_msg = if is_production() {
                    "Configuration error".to_string()
                } else {
                    log_msg.clone()
                };
                (StatusCode::INTERNAL_SERVER_ERROR, "SETTINGS_ERROR", client_msg, log_msg)
            }
            AppError::Configuration(msg) => {
                let client_msg = if is_production() {
                    "Tenant misconfiguration".to_string()
                } else {
                    msg.clone()
                };
                (StatusCode::INTERNAL_SERVER_ERROR, "CONFIGURATION_ERROR", client_msg, msg.clone())
            }
            AppError::Delivery(msg) => {
                let client_msg = if is_production() {
                    "Delivery failed".to_string()
                } else {
                    msg.clone()
                };
                (StatusCode::INTERNAL_SERVER_ERROR, "DELIVERY_ERROR", client_msg, msg.clone())
            }
            AppError::Broker(msg) | AppError::EmailTransport(msg) | AppError::Storage(msg) => {
                let client_msg = if is_production() {
                    "Service temporarily unavailable".to_string()
                } else {
                    msg.clone()
                };
                (StatusCode::INTERNAL_SERVER_ERROR, "UPSTREAM_ERROR", client_msg, msg.clone())
            }
            AppError::Redis(e) => {
                let log_msg = e.to_string();
                let client_msg = if is_production() {
                    "Service temporarily unavailable".to_string()
                } else {
                    log_msg.clone()
                };
                (StatusCode::INTERNAL_SERVER_ERROR, "REDIS_ERROR", client_msg, log_msg)
            }
        };

        // Always log the detailed error server-side
        tracing::error!(
            code = %code,
            status = %status.as_u16(),
            message = %log_message,
            "API error"
        );

        let body = ErrorResponse {
            error: ErrorBody {
                code: code.to_string(),
                message: client_message,
            },
        };

        (status, Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
