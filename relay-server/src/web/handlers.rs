//! Intake endpoint handlers.
//!
//! These handlers only format and enqueue. They never wait on the mail
//! server, so a slow or failing SMTP relay cannot delay a response.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{error, info};

use crate::format::format_submission;
use crate::queue::{QueueError, QueueSender};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub queue: QueueSender,
}

impl AppState {
    pub fn new(queue: QueueSender) -> Self {
        Self { queue }
    }
}

// =============================================================================
// Health Check
// =============================================================================

/// Health check response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// Health check endpoint.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

// =============================================================================
// Form Submission
// =============================================================================

/// Request body of `POST /api/send-form`.
///
/// `data` is the raw form: a `source` tag plus whatever fields that form has.
#[derive(Debug, Deserialize)]
pub struct SendFormPayload {
    pub data: Map<String, Value>,
}

/// The submission was accepted for later delivery (not delivered yet).
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct QueuedResponse {
    pub status: String,
    pub queued: bool,
}

/// Server-side failure with a human-readable explanation.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub detail: String,
}

/// Form submission endpoint.
///
/// This endpoint:
/// 1. Formats the submission into an email job
/// 2. Enqueues it for the delivery worker
/// 3. Returns 200 OK without waiting for the send
pub async fn send_form(
    State(state): State<AppState>,
    Json(payload): Json<SendFormPayload>,
) -> Response {
    info!(field_count = payload.data.len(), "send_form_received");

    let job = format_submission(payload.data);

    if let Err(e) = state.queue.enqueue(job).await {
        let status = match e {
            QueueError::Full { .. } => StatusCode::SERVICE_UNAVAILABLE,
            QueueError::Closed => StatusCode::INTERNAL_SERVER_ERROR,
        };
        error!(error = %e, status = status.as_u16(), "send_form_enqueue_failed");

        return (
            status,
            Json(ErrorResponse {
                detail: format!("Failed to queue the email: {}", e),
            }),
        )
            .into_response();
    }

    info!("send_form_enqueued");

    (
        StatusCode::OK,
        Json(QueuedResponse {
            status: "ok".to_string(),
            queued: true,
        }),
    )
        .into_response()
}
