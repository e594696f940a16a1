//! Delivery worker: the single consumer of the delivery queue.
//!
//! The worker:
//! 1. Waits for the next job (or a shutdown signal)
//! 2. Sends it through the mail transport on tokio's blocking pool
//! 3. Retries transient failures with capped exponential backoff
//! 4. Logs and reports the outcome, then goes back to waiting
//!
//! Jobs are handled strictly one at a time, so delivery order matches queue
//! order and at most one SMTP conversation is open.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::mail::{MailError, MailTransport};
use crate::queue::{DeliveryOutcome, DeliveryReport, EmailJob, QueueReceiver};

/// Error recorded for jobs given up on when the drain period runs out.
pub const DRAIN_TIMED_OUT: &str = "shutdown drain timed out";

/// How long shutdown waits for the worker to record abandoned jobs.
const ABANDON_GRACE: Duration = Duration::from_secs(5);

/// Retry behaviour of the worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerOptions {
    /// Send attempts per job, including the first one
    pub max_attempts: u32,
    /// Delay before the first retry
    pub retry_backoff: Duration,
    /// Upper bound for any retry delay
    pub max_backoff: Duration,
}

impl WorkerOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            retry_backoff: config.retry_backoff,
            max_backoff: config.max_backoff,
        }
    }

    /// Delay after the given failed attempt (1-based).
    ///
    /// Doubles per attempt up to `max_backoff`, then picks a random point in
    /// the upper half of that window.
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        let capped = self
            .retry_backoff
            .checked_mul(factor)
            .unwrap_or(self.max_backoff)
            .min(self.max_backoff);

        let ms = capped.as_millis() as u64;
        if ms == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::thread_rng().gen_range(ms / 2..=ms))
    }
}

/// Lifecycle phase pushed to the worker by its [`WorkerHandle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum WorkerPhase {
    Running,
    /// Queue closed to new jobs; deliver what is left
    Draining,
    /// Stop sending; record every remaining job as failed
    Abandoned,
}

/// Wait until the phase reaches `target`.
///
/// Returns `false` if the handle was dropped first.
async fn reached(phase: &mut watch::Receiver<WorkerPhase>, target: WorkerPhase) -> bool {
    loop {
        if *phase.borrow_and_update() >= target {
            return true;
        }
        if phase.changed().await.is_err() {
            return false;
        }
    }
}

/// Resolves only on an explicit abandon. A dropped handle means drain.
async fn abandoned(phase: &mut watch::Receiver<WorkerPhase>) {
    if !reached(phase, WorkerPhase::Abandoned).await {
        std::future::pending::<()>().await;
    }
}

/// Counters returned when the worker stops.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct WorkerStats {
    pub delivered: u64,
    pub failed: u64,
}

/// Background consumer of the delivery queue.
pub struct DeliveryWorker {
    queue: QueueReceiver,
    transport: Arc<dyn MailTransport>,
    options: WorkerOptions,
    reports: Option<mpsc::UnboundedSender<DeliveryReport>>,
}

enum Next {
    Job(Option<EmailJob>),
    Shutdown,
}

impl DeliveryWorker {
    pub fn new(
        queue: QueueReceiver,
        transport: Arc<dyn MailTransport>,
        options: WorkerOptions,
    ) -> Self {
        Self {
            queue,
            transport,
            options,
            reports: None,
        }
    }

    /// Also publish a [`DeliveryReport`] per job on the given channel.
    pub fn with_reports(mut self, reports: mpsc::UnboundedSender<DeliveryReport>) -> Self {
        self.reports = Some(reports);
        self
    }

    /// Spawn the worker loop onto the runtime.
    pub fn spawn(self) -> WorkerHandle {
        let (phase_tx, phase_rx) = watch::channel(WorkerPhase::Running);
        let join = tokio::spawn(self.run(phase_rx));

        WorkerHandle {
            phase: phase_tx,
            join,
        }
    }

    /// Run until draining is signalled (or the phase sender is dropped) and
    /// every job queued by then has been handled, or until all producers are
    /// gone and the queue is empty. On abandon, the job in flight and every
    /// queued job are recorded as failed instead of sent.
    pub async fn run(mut self, mut phase: watch::Receiver<WorkerPhase>) -> WorkerStats {
        let mut stats = WorkerStats::default();
        let mut draining = false;

        info!(
            max_attempts = self.options.max_attempts,
            retry_backoff_ms = self.options.retry_backoff.as_millis() as u64,
            "delivery_worker_started"
        );

        loop {
            let next = if draining {
                Next::Job(self.queue.dequeue().await)
            } else {
                tokio::select! {
                    _ = reached(&mut phase, WorkerPhase::Draining) => Next::Shutdown,
                    job = self.queue.dequeue() => Next::Job(job),
                }
            };

            let job = match next {
                Next::Shutdown => {
                    info!("delivery_worker_draining");
                    self.queue.close();
                    draining = true;
                    continue;
                }
                Next::Job(Some(job)) => job,
                Next::Job(None) => break,
            };

            let report = self.deliver(job, &mut phase).await;
            self.record(report, &mut stats);

            if *phase.borrow() == WorkerPhase::Abandoned {
                self.abandon_remaining(&mut stats).await;
                break;
            }
        }

        info!(
            delivered = stats.delivered,
            failed = stats.failed,
            "delivery_worker_stopped"
        );

        stats
    }

    fn record(&self, report: DeliveryReport, stats: &mut WorkerStats) {
        if report.is_delivered() {
            stats.delivered += 1;
        } else {
            stats.failed += 1;
        }

        if let Some(reports) = &self.reports {
            // Nobody listening is fine
            let _ = reports.send(report);
        }
    }

    /// Close the queue and record everything still in it as failed.
    async fn abandon_remaining(&mut self, stats: &mut WorkerStats) {
        self.queue.close();
        while let Some(job) = self.queue.dequeue().await {
            let report = self.abandon(&job, 0);
            self.record(report, stats);
        }
    }

    /// Log a job that will not be sent, with enough to resend it by hand.
    fn abandon(&self, job: &EmailJob, attempts: u32) -> DeliveryReport {
        error!(
            subject = %job.subject,
            body_preview = %job.body_preview(),
            attempts = attempts,
            permanent = true,
            error = DRAIN_TIMED_OUT,
            "delivery_failed"
        );
        self.report(
            job,
            attempts,
            DeliveryOutcome::Failed {
                error: DRAIN_TIMED_OUT.to_string(),
            },
        )
    }

    /// Deliver one job, retrying transient failures, unless abandoned first.
    async fn deliver(
        &self,
        job: EmailJob,
        phase: &mut watch::Receiver<WorkerPhase>,
    ) -> DeliveryReport {
        let job = Arc::new(job);
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;

            info!(
                subject = %job.subject,
                body_length = job.body.len(),
                attempt = attempt,
                "delivery_attempt_starting"
            );

            // An abandoned send may still complete on its blocking thread
            let result = tokio::select! {
                result = self.send_once(&job) => result,
                _ = abandoned(phase) => return self.abandon(&job, attempt),
            };

            let error = match result {
                Ok(()) => {
                    info!(subject = %job.subject, attempt = attempt, "delivery_sent");
                    return self.report(&job, attempt, DeliveryOutcome::Delivered);
                }
                Err(e) => e,
            };

            if error.is_permanent() || attempt >= self.options.max_attempts {
                error!(
                    subject = %job.subject,
                    body_preview = %job.body_preview(),
                    attempts = attempt,
                    permanent = error.is_permanent(),
                    error = %error,
                    "delivery_failed"
                );
                return self.report(
                    &job,
                    attempt,
                    DeliveryOutcome::Failed {
                        error: error.to_string(),
                    },
                );
            }

            let backoff = self.options.backoff_for(attempt);
            warn!(
                subject = %job.subject,
                attempt = attempt,
                backoff_ms = backoff.as_millis() as u64,
                error = %error,
                "delivery_retry_scheduled"
            );

            tokio::select! {
                _ = sleep(backoff) => {}
                _ = abandoned(phase) => return self.abandon(&job, attempt),
            }
        }
    }

    /// One send on the blocking pool.
    async fn send_once(&self, job: &Arc<EmailJob>) -> Result<(), MailError> {
        let transport = Arc::clone(&self.transport);
        let job = Arc::clone(job);

        tokio::task::spawn_blocking(move || transport.send(&job))
            .await
            .map_err(|e| MailError::Interrupted(e.to_string()))?
    }

    fn report(&self, job: &EmailJob, attempts: u32, outcome: DeliveryOutcome) -> DeliveryReport {
        DeliveryReport {
            subject: job.subject.clone(),
            body_preview: job.body_preview(),
            attempts,
            outcome,
        }
    }
}

/// Lifecycle handle of a spawned [`DeliveryWorker`].
pub struct WorkerHandle {
    phase: watch::Sender<WorkerPhase>,
    join: JoinHandle<WorkerStats>,
}

impl WorkerHandle {
    /// Stop intake into the queue and wait up to `grace` for queued jobs to be
    /// delivered.
    ///
    /// When `grace` runs out the worker stops sending and records the job in
    /// flight plus everything still queued as failed, then `None` is
    /// returned. The worker is only aborted if even that does not finish.
    pub async fn shutdown(self, grace: Duration) -> Option<WorkerStats> {
        let _ = self.phase.send(WorkerPhase::Draining);
        let mut join = self.join;

        match tokio::time::timeout(grace, &mut join).await {
            Ok(Ok(stats)) => return Some(stats),
            Ok(Err(e)) => {
                error!(error = %e, "delivery_worker_join_failed");
                return None;
            }
            Err(_) => {
                warn!(
                    grace_secs = grace.as_secs_f64(),
                    "delivery_drain_timed_out"
                );
            }
        }

        let _ = self.phase.send(WorkerPhase::Abandoned);

        match tokio::time::timeout(ABANDON_GRACE, &mut join).await {
            Ok(Ok(stats)) => {
                warn!(
                    delivered = stats.delivered,
                    failed = stats.failed,
                    "delivery_worker_abandoned"
                );
            }
            Ok(Err(e)) => error!(error = %e, "delivery_worker_join_failed"),
            Err(_) => {
                error!("delivery_worker_abandon_timed_out");
                join.abort();
            }
        }

        None
    }
}
