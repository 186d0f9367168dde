use axum::{
    routing::{get, post},
    Router,
};

use crate::server::AppState;

use super::handlers::{contact, enqueue_notification, subscribe, unsubscribe};
use super::health::{health, stats};

pub fn api_routes() -> Router<AppState> {
    Router::new()
        // Health & Stats
        .route("/health", get(health))
        .route("/stats", get(stats))
        // Embedded in every outgoing email, must stay at the root
        .route("/unsubscribe", get(unsubscribe))
        .nest(
            "/api/v1",
            Router::new()
                .route("/notifications", post(enqueue_notification))
                .route("/subscriptions", post(subscribe))
                .route("/contact", post(contact)),
        )
}
