use std::sync::Arc;

use anyhow::Result;
use tokio::net::TcpListener;
use tokio::signal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use herald_notification_service::config::Settings;
use herald_notification_service::server::{create_app, AppState};
use herald_notification_service::triggers::{
    NotifyCommandConsumer, SubscribeCommandConsumer, SubscribedEventConsumer,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    init_tracing();

    // Load configuration
    let settings = Settings::new()?;
    tracing::info!("Configuration loaded");

    // Create application state
    let state = AppState::new(settings.clone()).await?;
    tracing::info!("Application state initialized");

    // Start the notify command consumer in background
    let notify_consumer = Arc::new(NotifyCommandConsumer::new(
        state.broker.clone(),
        state.flow.clone(),
        &settings.broker,
    ));
    let shutdown_signal = notify_consumer.shutdown_signal();
    let notify_consumer_clone = notify_consumer.clone();
    let notify_handle = tokio::spawn(async move {
        if let Err(e) = notify_consumer_clone.start().await {
            tracing::error!(error = %e, "Notify command consumer failed");
        }
    });

    // Start the subscribe command consumer in background
    let subscribe_consumer = Arc::new(SubscribeCommandConsumer::new(
        state.broker.clone(),
        state.subscriptions.clone(),
        &settings.broker,
    ));
    let subscribe_shutdown = subscribe_consumer.shutdown_signal();
    let subscribe_consumer_clone = subscribe_consumer.clone();
    let subscribe_handle = tokio::spawn(async move {
        if let Err(e) = subscribe_consumer_clone.start().await {
            tracing::error!(error = %e, "Subscribe command consumer failed");
        }
    });

    // Start the subscribed event consumer in background
    let subscribed_consumer = Arc::new(SubscribedEventConsumer::new(
        state.broker.clone(),
        state.greetings.clone(),
        &settings.broker,
    ));
    let subscribed_shutdown = subscribed_consumer.shutdown_signal();
    let subscribed_consumer_clone = subscribed_consumer.clone();
    let subscribed_handle = tokio::spawn(async move {
        if let Err(e) = subscribed_consumer_clone.start().await {
            tracing::error!(error = %e, "Subscribed event consumer failed");
        }
    });

    // Create Axum app
    let app = create_app(state);

    // Start server
    let addr = settings.server_addr();
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal_handler(vec![
            shutdown_signal,
            subscribe_shutdown,
            subscribed_shutdown,
        ]))
        .await?;

    // Wait for background tasks to finish
    tracing::info!("Waiting for background tasks to finish...");
    let _ = tokio::join!(notify_handle, subscribe_handle, subscribed_handle);

    tracing::info!("Server shutdown complete");
    Ok(())
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

async fn shutdown_signal_handler(consumer_txs: Vec<tokio::sync::broadcast::Sender<()>>) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received terminate signal, initiating graceful shutdown");
        }
    }

    // Send shutdown signal to every consumer
    for tx in consumer_txs {
        let _ = tx.send(());
    }
}
