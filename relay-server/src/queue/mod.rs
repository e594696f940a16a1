//! Delivery queue module.
//!
//! This module provides:
//! - Message types handed from intake to the delivery worker
//! - The single-consumer FIFO queue that carries them
//!
//! ## Architecture
//!
//! ```text
//! Intake → QueueSender → delivery queue → QueueReceiver → Delivery Worker
//! ```

pub mod delivery;
pub mod types;

pub use delivery::{
    delivery_queue, OverflowPolicy, QueueCapacity, QueueError, QueueReceiver, QueueSender,
};
pub use types::{DeliveryOutcome, DeliveryReport, EmailJob, BODY_PREVIEW_CHARS, EMAIL_SUBJECT};
