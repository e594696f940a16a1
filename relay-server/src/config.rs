//! Configuration module for environment variable parsing.
//!
//! Everything here is read once at startup. The `SMTP_*` variables are not:
//! the mail transport reads them at send time (see [`crate::mail`]).

use std::env;
use std::time::Duration;

use tracing::warn;

use crate::queue::{OverflowPolicy, QueueCapacity};

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Port for the web server to listen on
    pub port: u16,

    /// Delivery queue sizing and overflow behaviour
    pub queue_capacity: QueueCapacity,

    /// Send attempts per job, including the first one
    pub max_attempts: u32,

    /// Delay before the first retry; doubles on each further retry
    pub retry_backoff: Duration,

    /// Upper bound for the retry delay
    pub max_backoff: Duration,

    /// How long shutdown waits for queued jobs to be delivered
    pub shutdown_drain: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            port: 8000,
            queue_capacity: QueueCapacity::Unbounded,
            max_attempts: 3,
            retry_backoff: Duration::from_millis(2000),
            max_backoff: Duration::from_millis(60_000),
            shutdown_drain: Duration::from_secs(30),
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let defaults = Config::default();

        Config {
            port: parse_var("PORT").unwrap_or(defaults.port),

            queue_capacity: parse_queue_capacity(
                parse_var::<usize>("QUEUE_CAPACITY"),
                env::var("QUEUE_OVERFLOW").ok().as_deref(),
            ),

            max_attempts: parse_var("DELIVERY_MAX_ATTEMPTS")
                .unwrap_or(defaults.max_attempts)
                .max(1),

            retry_backoff: parse_var("DELIVERY_RETRY_BACKOFF_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.retry_backoff),

            max_backoff: parse_var("DELIVERY_MAX_BACKOFF_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.max_backoff),

            shutdown_drain: parse_var("SHUTDOWN_DRAIN_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.shutdown_drain),
        }
    }
}

/// Parse a variable, warning when it is set but unparseable.
fn parse_var<T: std::str::FromStr>(name: &str) -> Option<T> {
    let raw = env::var(name).ok()?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(env_var = name, value = %raw, "Invalid value, using default");
            None
        }
    }
}

/// Combine `QUEUE_CAPACITY` and `QUEUE_OVERFLOW` into a queue sizing.
///
/// A missing or zero capacity means unbounded.
fn parse_queue_capacity(capacity: Option<usize>, overflow: Option<&str>) -> QueueCapacity {
    let capacity = match capacity {
        Some(n) if n > 0 => n,
        _ => return QueueCapacity::Unbounded,
    };

    let overflow = match overflow.map(|s| s.trim().to_lowercase()).as_deref() {
        None | Some("reject") => OverflowPolicy::Reject,
        Some("block") => OverflowPolicy::Block,
        Some(other) => {
            warn!(env_var = "QUEUE_OVERFLOW", value = %other, "Unknown overflow policy, using reject");
            OverflowPolicy::Reject
        }
    };

    QueueCapacity::Bounded { capacity, overflow }
}
