//! Message formatting module.
//!
//! Turns an arbitrary form field map into the plain-text email that is
//! queued for delivery.
//!
//! ## Formatting Flow
//!
//! ```text
//! field map → Submission::from_fields() → format_body() → EmailJob
//! ```

pub mod submission;
pub mod value;

use serde_json::{Map, Value};
use tracing::info;

use crate::queue::{EmailJob, EMAIL_SUBJECT};

pub use submission::{CallbackModal, CtaPhone, RoofingQuiz, Submission, TerraceQuiz};
pub use value::{is_truthy, render_value};

/// First line of every message body.
pub const BODY_HEADER: &str = "New submission from website:";

/// Compose the message body for a submission.
pub fn format_body(submission: &Submission) -> String {
    let mut lines = vec![BODY_HEADER.to_string(), String::new()];
    lines.extend(submission.lines());
    lines.join("\n")
}

/// Format a raw field map into a job ready for the delivery queue.
pub fn format_submission(fields: Map<String, Value>) -> EmailJob {
    let field_count = fields.len();
    let submission = Submission::from_fields(fields);
    let body = format_body(&submission);

    info!(
        kind = submission.kind(),
        field_count = field_count,
        body_length = body.len(),
        "submission_formatted"
    );

    EmailJob::new(EMAIL_SUBJECT.to_string(), body)
}
