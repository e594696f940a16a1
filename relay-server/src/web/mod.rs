//! Web server module for form intake.
//!
//! A thin, fast HTTP layer that:
//! - Accepts form submissions as `{"data": {...}}`
//! - Formats them into an email job
//! - Enqueues the job and answers immediately
//!
//! Sending happens later in the delivery worker.

pub mod handlers;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub use handlers::{
    health, send_form, AppState, ErrorResponse, HealthResponse, QueuedResponse, SendFormPayload,
};

/// Build the intake router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/send-form", post(send_form))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
