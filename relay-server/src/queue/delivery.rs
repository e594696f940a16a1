//! In-process delivery queue between intake and the delivery worker.
//!
//! Built on tokio `mpsc`: any number of cloned [`QueueSender`]s feed exactly
//! one [`QueueReceiver`], which is not `Clone`, so a second consumer cannot
//! exist. Jobs come out in the order their enqueue completed.

use thiserror::Error;
use tokio::sync::mpsc::{self, error::TrySendError};

use super::types::EmailJob;

/// What a bounded queue does when it is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverflowPolicy {
    /// Fail the enqueue with [`QueueError::Full`]
    Reject,
    /// Wait until the worker frees a slot
    Block,
}

/// Queue sizing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueCapacity {
    /// No limit. A burst or a long mail outage grows memory without bound.
    Unbounded,
    Bounded {
        capacity: usize,
        overflow: OverflowPolicy,
    },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueueError {
    #[error("delivery queue is full ({capacity} jobs pending)")]
    Full { capacity: usize },

    #[error("delivery queue is closed")]
    Closed,
}

/// Create a delivery queue, returning its producer and its only consumer.
pub fn delivery_queue(capacity: QueueCapacity) -> (QueueSender, QueueReceiver) {
    match capacity {
        QueueCapacity::Unbounded => {
            let (tx, rx) = mpsc::unbounded_channel();
            (
                QueueSender {
                    inner: SenderInner::Unbounded(tx),
                },
                QueueReceiver {
                    inner: ReceiverInner::Unbounded(rx),
                },
            )
        }
        QueueCapacity::Bounded { capacity, overflow } => {
            // tokio panics on a zero-sized channel
            let capacity = capacity.max(1);
            let (tx, rx) = mpsc::channel(capacity);
            (
                QueueSender {
                    inner: SenderInner::Bounded {
                        tx,
                        capacity,
                        overflow,
                    },
                },
                QueueReceiver {
                    inner: ReceiverInner::Bounded(rx),
                },
            )
        }
    }
}

/// Producer half. Cheap to clone; every clone appends to the same queue.
#[derive(Clone)]
pub struct QueueSender {
    inner: SenderInner,
}

#[derive(Clone)]
enum SenderInner {
    Unbounded(mpsc::UnboundedSender<EmailJob>),
    Bounded {
        tx: mpsc::Sender<EmailJob>,
        capacity: usize,
        overflow: OverflowPolicy,
    },
}

impl QueueSender {
    /// Append a job to the tail of the queue.
    ///
    /// Never waits on an unbounded queue. On a bounded queue the overflow
    /// policy decides between waiting and failing.
    pub async fn enqueue(&self, job: EmailJob) -> Result<(), QueueError> {
        match &self.inner {
            SenderInner::Unbounded(tx) => tx.send(job).map_err(|_| QueueError::Closed),
            SenderInner::Bounded {
                tx,
                overflow: OverflowPolicy::Block,
                ..
            } => tx.send(job).await.map_err(|_| QueueError::Closed),
            SenderInner::Bounded {
                tx,
                capacity,
                overflow: OverflowPolicy::Reject,
            } => tx.try_send(job).map_err(|e| match e {
                TrySendError::Full(_) => QueueError::Full {
                    capacity: *capacity,
                },
                TrySendError::Closed(_) => QueueError::Closed,
            }),
        }
    }

    /// Whether the consumer has stopped accepting jobs.
    pub fn is_closed(&self) -> bool {
        match &self.inner {
            SenderInner::Unbounded(tx) => tx.is_closed(),
            SenderInner::Bounded { tx, .. } => tx.is_closed(),
        }
    }
}

/// Consumer half. Exactly one exists per queue.
pub struct QueueReceiver {
    inner: ReceiverInner,
}

enum ReceiverInner {
    Unbounded(mpsc::UnboundedReceiver<EmailJob>),
    Bounded(mpsc::Receiver<EmailJob>),
}

impl QueueReceiver {
    /// Wait for the next job.
    ///
    /// Returns `None` once the queue is closed (or every sender is gone) and
    /// all remaining jobs have been taken.
    pub async fn dequeue(&mut self) -> Option<EmailJob> {
        match &mut self.inner {
            ReceiverInner::Unbounded(rx) => rx.recv().await,
            ReceiverInner::Bounded(rx) => rx.recv().await,
        }
    }

    /// Stop accepting new jobs. Jobs already queued can still be dequeued.
    pub fn close(&mut self) {
        match &mut self.inner {
            ReceiverInner::Unbounded(rx) => rx.close(),
            ReceiverInner::Bounded(rx) => rx.close(),
        }
    }
}
