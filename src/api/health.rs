use axum::{extract::State, Json};
use serde::Serialize;

use crate::server::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub notifications: NotificationStats,
}

#[derive(Debug, Serialize)]
pub struct NotificationStats {
    pub delivered: u64,
    pub skipped: u64,
    pub failed: u64,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

pub async fn stats(State(state): State<AppState>) -> Json<StatsResponse> {
    let flow_stats = state.flow.stats();

    Json(StatsResponse {
        notifications: NotificationStats {
            delivered: flow_stats.delivered,
            skipped: flow_stats.skipped,
            failed: flow_stats.failed,
        },
    })
}
