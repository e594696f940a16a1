//! Message types flowing through the delivery queue.
//!
//! - `EmailJob`: a formatted message waiting to be sent
//! - `DeliveryReport`: what happened to a job once the worker is done with it

use serde::{Deserialize, Serialize};

/// Subject line of every relayed submission.
pub const EMAIL_SUBJECT: &str = "New submission from the website";

/// Longest body excerpt carried in logs and reports.
pub const BODY_PREVIEW_CHARS: usize = 200;

// =============================================================================
// Email Job
// =============================================================================

/// Formatted email waiting for delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailJob {
    /// Email subject
    pub subject: String,
    /// Plain text body
    pub body: String,
}

impl EmailJob {
    /// Create a new email job.
    pub fn new(subject: String, body: String) -> Self {
        Self { subject, body }
    }

    /// Start of the body, cut at a character boundary.
    pub fn body_preview(&self) -> String {
        if self.body.chars().count() <= BODY_PREVIEW_CHARS {
            return self.body.clone();
        }
        let mut preview: String = self.body.chars().take(BODY_PREVIEW_CHARS).collect();
        preview.push_str("...");
        preview
    }
}

// =============================================================================
// Delivery Reports
// =============================================================================

/// Final outcome of one job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DeliveryOutcome {
    Delivered,
    Failed { error: String },
}

/// Emitted once per job after the worker has finished with it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryReport {
    pub subject: String,
    /// Truncated body, enough to recover a lost submission by hand
    pub body_preview: String,
    /// Number of send attempts made
    pub attempts: u32,
    #[serde(flatten)]
    pub outcome: DeliveryOutcome,
}

impl DeliveryReport {
    pub fn is_delivered(&self) -> bool {
        self.outcome == DeliveryOutcome::Delivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_body_preview_short_body_is_unchanged() {
        let job = EmailJob::new(EMAIL_SUBJECT.to_string(), "Phone: 123".to_string());
        assert_eq!(job.body_preview(), "Phone: 123");
    }

    #[test]
    fn test_body_preview_truncates_on_char_boundary() {
        let job = EmailJob::new(EMAIL_SUBJECT.to_string(), "ж".repeat(500));
        let preview = job.body_preview();

        assert!(preview.ends_with("..."));
        assert_eq!(preview.chars().count(), BODY_PREVIEW_CHARS + 3);
    }

    #[test]
    fn test_delivery_report_serialization() {
        let report = DeliveryReport {
            subject: EMAIL_SUBJECT.to_string(),
            body_preview: "Name: Ivan".to_string(),
            attempts: 3,
            outcome: DeliveryOutcome::Failed {
                error: "SMTP error: connection refused".to_string(),
            },
        };

        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains("\"outcome\":\"failed\""));
        assert!(json.contains("\"attempts\":3"));
        assert!(!report.is_delivered());
    }
}
