//! Outbound mail module.
//!
//! The delivery worker only sees the [`MailTransport`] trait. The production
//! implementation is [`SmtpMailer`], a blocking lettre SMTP client that the
//! worker runs on tokio's blocking pool.
//!
//! # Environment Variables
//!
//! Read by [`SmtpSettings::from_env`] on every send attempt:
//!
//! | Variable | Required | Description |
//! |----------|----------|-------------|
//! | `SMTP_HOST` | Yes | SMTP server hostname |
//! | `SMTP_PORT` | No | Port (default: 587) |
//! | `SMTP_USER` | Yes | Login, also used as the From address |
//! | `SMTP_PASSWORD` | Yes | Password for authentication |
//! | `SMTP_TO` | Yes | Where submissions are sent |
//! | `SMTP_TLS` | No | `tls` (default, implicit TLS) or `starttls` |
//! | `SMTP_TIMEOUT_SECS` | No | Socket timeout (default: 20) |

pub mod smtp;

#[cfg(test)]
pub(crate) mod testing;

use thiserror::Error;

use crate::queue::EmailJob;

pub use smtp::{SmtpMailer, SmtpSettings, TlsMode};

#[derive(Debug, Error)]
pub enum MailError {
    #[error("missing required config: {0}")]
    MissingConfig(String),

    #[error("invalid email address: {0}")]
    InvalidAddress(String),

    #[error("failed to build message: {0}")]
    Build(String),

    /// The server refused the message with a permanent (5xx) reply
    #[error("SMTP rejected message: {0}")]
    Rejected(String),

    #[error("SMTP error: {0}")]
    Smtp(String),

    /// The blocking send task panicked or was cancelled
    #[error("mail transport task failed: {0}")]
    Interrupted(String),
}

impl MailError {
    /// Whether retrying the same job can never succeed.
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            MailError::MissingConfig(_)
                | MailError::InvalidAddress(_)
                | MailError::Build(_)
                | MailError::Rejected(_)
        )
    }
}

/// Synchronous mail sending.
///
/// Implementations may block on network I/O. Callers running on an async
/// runtime must invoke them through `tokio::task::spawn_blocking`.
pub trait MailTransport: Send + Sync + 'static {
    /// Send one job, connecting and disconnecting as needed.
    fn send(&self, job: &EmailJob) -> Result<(), MailError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permanent_errors() {
        assert!(MailError::MissingConfig("SMTP_HOST".to_string()).is_permanent());
        assert!(MailError::Rejected("550 mailbox unavailable".to_string()).is_permanent());
        assert!(!MailError::Smtp("connection refused".to_string()).is_permanent());
        assert!(!MailError::Interrupted("panicked".to_string()).is_permanent());
    }
}
