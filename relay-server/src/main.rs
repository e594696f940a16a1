//! FormRelay server - form intake and background email delivery.
//!
//! This binary:
//! - Receives form submissions on `POST /api/send-form`
//! - Formats and enqueues them, answering immediately
//! - Sends each queued email from a single background worker
//!
//! On SIGINT/SIGTERM the server stops accepting requests, then gives the
//! worker a bounded period to deliver what is still queued.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::{net::TcpListener, signal};
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use formrelay::web::router;
use formrelay::{AppContext, AppState, Config, SmtpMailer};

#[tokio::main]
async fn main() -> Result<()> {
    // Values already in the environment win over .env
    dotenvy::dotenv().ok();

    // Initialize structured JSON logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().json().flatten_event(true))
        .init();

    info!("server_starting");

    // Load configuration
    let config = Config::from_env();
    info!(
        port = config.port,
        queue_capacity = ?config.queue_capacity,
        max_attempts = config.max_attempts,
        shutdown_drain_secs = config.shutdown_drain.as_secs(),
        smtp_host_set = std::env::var("SMTP_HOST").is_ok(),
        "config_loaded"
    );

    // SMTP settings are read per send, so missing ones only show up as failed deliveries
    let context = AppContext::start(&config, Arc::new(SmtpMailer::from_env()));

    let app = router(AppState::new(context.queue()));

    // Bind to address
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    info!(address = %addr, "server_listening");

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    // Deliver what is still queued
    context.shutdown().await;

    info!("server_shutdown_complete");

    Ok(())
}

/// Create a future that completes when a shutdown signal is received.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT"),
        _ = terminate => info!("Received SIGTERM"),
    }

    info!("server_shutting_down");
}
