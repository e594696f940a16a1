//! In-memory transports for exercising the worker without a mail server.

use std::collections::VecDeque;
use std::sync::{mpsc, Mutex};

use super::{MailError, MailTransport};
use crate::queue::EmailJob;

/// Records every job it is asked to send.
///
/// Failures are scripted: each call pops the next entry from `script`, and an
/// empty script means success. A body containing `poison` always fails with a
/// transient error.
#[derive(Default)]
pub struct RecordingTransport {
    pub sent: Mutex<Vec<EmailJob>>,
    pub attempts: Mutex<Vec<EmailJob>>,
    script: Mutex<VecDeque<Option<MailError>>>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next attempts with the given errors, in order.
    pub fn failing_with(errors: Vec<MailError>) -> Self {
        let transport = Self::default();
        transport
            .script
            .lock()
            .unwrap()
            .extend(errors.into_iter().map(Some));
        transport
    }

    pub fn sent_bodies(&self) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .map(|job| job.body.clone())
            .collect()
    }

    pub fn attempt_count(&self) -> usize {
        self.attempts.lock().unwrap().len()
    }
}

impl MailTransport for RecordingTransport {
    fn send(&self, job: &EmailJob) -> Result<(), MailError> {
        self.attempts.lock().unwrap().push(job.clone());

        if job.body.contains("poison") {
            return Err(MailError::Smtp("connection reset by peer".to_string()));
        }
        if let Some(Some(error)) = self.script.lock().unwrap().pop_front() {
            return Err(error);
        }

        self.sent.lock().unwrap().push(job.clone());
        Ok(())
    }
}

/// Blocks inside `send` until the test releases it.
pub struct GatedTransport {
    pub started: Mutex<mpsc::Sender<String>>,
    release: Mutex<mpsc::Receiver<()>>,
}

impl GatedTransport {
    /// Returns the transport, a receiver announcing each started send, and a
    /// sender that lets one send complete per message.
    pub fn new() -> (Self, mpsc::Receiver<String>, mpsc::Sender<()>) {
        let (started_tx, started_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        (
            Self {
                started: Mutex::new(started_tx),
                release: Mutex::new(release_rx),
            },
            started_rx,
            release_tx,
        )
    }
}

impl MailTransport for GatedTransport {
    fn send(&self, job: &EmailJob) -> Result<(), MailError> {
        let _ = self.started.lock().unwrap().send(job.body.clone());
        self.release
            .lock()
            .unwrap()
            .recv()
            .map_err(|e| MailError::Interrupted(e.to_string()))
    }
}
