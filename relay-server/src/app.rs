//! Application context: owns the delivery queue and the worker's lifecycle.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::info;

use crate::config::Config;
use crate::mail::MailTransport;
use crate::queue::{delivery_queue, DeliveryReport, QueueSender};
use crate::worker::{DeliveryWorker, WorkerHandle, WorkerOptions, WorkerStats};

/// Everything intake needs to hand jobs off, plus the handle that stops the
/// worker again.
///
/// Built once at startup. [`AppContext::shutdown`] closes the queue and lets
/// the worker deliver what is already queued for up to `drain`. Jobs still
/// unsent after that are logged and reported as failed.
pub struct AppContext {
    queue: QueueSender,
    worker: WorkerHandle,
    drain: Duration,
}

impl AppContext {
    /// Create the queue and spawn its worker. Must run inside a tokio runtime.
    pub fn start(config: &Config, transport: Arc<dyn MailTransport>) -> Self {
        Self::build(config, transport, None)
    }

    /// Like [`AppContext::start`], with a report per finished job sent to
    /// `reports`.
    pub fn start_with_reports(
        config: &Config,
        transport: Arc<dyn MailTransport>,
        reports: mpsc::UnboundedSender<DeliveryReport>,
    ) -> Self {
        Self::build(config, transport, Some(reports))
    }

    fn build(
        config: &Config,
        transport: Arc<dyn MailTransport>,
        reports: Option<mpsc::UnboundedSender<DeliveryReport>>,
    ) -> Self {
        let (queue, receiver) = delivery_queue(config.queue_capacity);

        let mut worker =
            DeliveryWorker::new(receiver, transport, WorkerOptions::from_config(config));
        if let Some(reports) = reports {
            worker = worker.with_reports(reports);
        }

        info!(
            queue_capacity = ?config.queue_capacity,
            max_attempts = config.max_attempts,
            "app_context_started"
        );

        Self {
            queue,
            worker: worker.spawn(),
            drain: config.shutdown_drain,
        }
    }

    /// Producer handle for intake.
    pub fn queue(&self) -> QueueSender {
        self.queue.clone()
    }

    /// Stop accepting jobs and drain the queue within the configured grace
    /// period. Returns the worker's counters if it finished in time.
    pub async fn shutdown(self) -> Option<WorkerStats> {
        info!(drain_secs = self.drain.as_secs_f64(), "app_context_shutting_down");
        let stats = self.worker.shutdown(self.drain).await;
        info!(stats = ?stats, "app_context_shutdown_complete");
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mail::testing::{GatedTransport, RecordingTransport};
    use crate::queue::{DeliveryOutcome, EmailJob, QueueError};
    use crate::worker::DRAIN_TIMED_OUT;

    fn job(body: &str) -> EmailJob {
        EmailJob::new("subject".to_string(), body.to_string())
    }

    #[tokio::test]
    async fn test_start_and_shutdown_delivers_queued_jobs() {
        let transport = Arc::new(RecordingTransport::new());
        let context = AppContext::start(&Config::default(), transport.clone());

        let queue = context.queue();
        queue.enqueue(job("one")).await.unwrap();
        queue.enqueue(job("two")).await.unwrap();

        let stats = context.shutdown().await.unwrap();

        assert_eq!(stats.delivered, 2);
        assert_eq!(transport.sent_bodies(), vec!["one", "two"]);
        assert_eq!(queue.enqueue(job("late")).await, Err(QueueError::Closed));
    }

    #[tokio::test]
    async fn test_reports_are_published() {
        let (report_tx, mut report_rx) = mpsc::unbounded_channel();
        let transport = Arc::new(RecordingTransport::new());
        let context =
            AppContext::start_with_reports(&Config::default(), transport, report_tx);

        context.queue().enqueue(job("hello")).await.unwrap();

        let report = report_rx.recv().await.unwrap();
        assert!(report.is_delivered());
        assert_eq!(report.body_preview, "hello");

        context.shutdown().await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_shutdown_gives_up_after_drain_period() {
        let (transport, started, release) = GatedTransport::new();
        let config = Config {
            shutdown_drain: Duration::from_millis(100),
            ..Config::default()
        };
        let context = AppContext::start(&config, Arc::new(transport));

        context.queue().enqueue(job("stuck")).await.unwrap();
        started.recv_timeout(Duration::from_secs(5)).unwrap();

        assert_eq!(context.shutdown().await, None);

        // Let the blocking send finish so the runtime can shut down
        release.send(()).unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_drain_timeout_reports_every_accepted_job() {
        let (report_tx, mut report_rx) = mpsc::unbounded_channel();
        let (transport, started, release) = GatedTransport::new();
        let config = Config {
            shutdown_drain: Duration::from_millis(100),
            ..Config::default()
        };
        let context = AppContext::start_with_reports(&config, Arc::new(transport), report_tx);

        let queue = context.queue();
        queue.enqueue(job("Phone: 111")).await.unwrap();
        queue.enqueue(job("Phone: 222")).await.unwrap();
        assert_eq!(started.recv_timeout(Duration::from_secs(5)).unwrap(), "Phone: 111");

        assert_eq!(context.shutdown().await, None);

        let mut reports = Vec::new();
        while let Some(report) = report_rx.recv().await {
            reports.push(report);
        }

        let previews: Vec<&str> = reports.iter().map(|r| r.body_preview.as_str()).collect();
        assert_eq!(previews, vec!["Phone: 111", "Phone: 222"]);
        for report in &reports {
            assert_eq!(
                report.outcome,
                DeliveryOutcome::Failed {
                    error: DRAIN_TIMED_OUT.to_string()
                }
            );
        }
        assert_eq!(reports[0].attempts, 1);
        assert_eq!(reports[1].attempts, 0);

        release.send(()).unwrap();
    }
}
