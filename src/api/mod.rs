//! HTTP API: request models, handlers and route composition.

mod handlers;
mod health;
mod models;
mod routes;

pub use models::{ContactUsRequest, SubscribeCommand};
pub use routes::api_routes;
