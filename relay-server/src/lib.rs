//! FormRelay - web form submissions relayed by email.
//!
//! This library provides the modules behind the `formrelay` server binary:
//! - `format`: turns a raw field map into a plain-text email job
//! - `queue`: single-consumer FIFO between intake and delivery
//! - `worker`: the background consumer that sends each job
//! - `mail`: the blocking SMTP transport
//! - `web`: the HTTP intake endpoint
//!
//! ## Architecture
//!
//! ```text
//! POST /api/send-form → format → delivery queue → Delivery Worker → SMTP
//! ```

pub mod app;
pub mod config;
pub mod format;
pub mod mail;
pub mod queue;
pub mod web;
pub mod worker;

// Re-export commonly used types
pub use app::AppContext;
pub use config::Config;
pub use format::{format_body, format_submission, Submission};
pub use mail::{MailError, MailTransport, SmtpMailer};
pub use queue::{
    delivery_queue, DeliveryReport, EmailJob, QueueCapacity, QueueError, QueueSender,
    EMAIL_SUBJECT,
};
pub use web::AppState;
pub use worker::{DeliveryWorker, WorkerOptions, WorkerStats};
