// Shared infrastructure
pub mod config;
pub mod error;

// Domain layer (business logic)
pub mod notification;
pub mod subscription;
pub mod template;

// External collaborators
pub mod broker;
pub mod email;
pub mod risk;

// Event-driven glue
pub mod events;

// Application layer
pub mod api;
pub mod server;
pub mod triggers;
