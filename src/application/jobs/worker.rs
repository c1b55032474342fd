//! Job worker loops.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::{backoff_delay, Job, JobQueue, QueueError, ReservedJob};
use crate::application::services::{MaintenanceService, NotificationService};
use crate::config::JobSettings;
use crate::infrastructure::metrics;
use crate::shared::error::AppError;

/// Executes one job.
#[async_trait]
pub trait JobHandler: Send + Sync {
    async fn handle(&self, job: &Job) -> Result<(), AppError>;
}

/// Routes jobs to the services that implement them.
pub struct JobDispatcher {
    notifications: Arc<dyn NotificationService>,
    maintenance: Arc<dyn MaintenanceService>,
}

impl JobDispatcher {
    pub fn new(
        notifications: Arc<dyn NotificationService>,
        maintenance: Arc<dyn MaintenanceService>,
    ) -> Self {
        Self {
            notifications,
            maintenance,
        }
    }
}

#[async_trait]
impl JobHandler for JobDispatcher {
    async fn handle(&self, job: &Job) -> Result<(), AppError> {
        match job {
            Job::DeliverNotification { notification } => {
                self.notifications.deliver(notification).await?;
            }
            Job::Cleanup => {
                let report = self.maintenance.cleanup().await?;
                info!(?report, "Cleanup finished");
            }
            Job::DueDateReminders => {
                let sent = self.maintenance.send_due_reminders().await?;
                if sent > 0 {
                    info!(tasks = sent, "Due date reminders sent");
                }
            }
        }
        Ok(())
    }
}

/// Reserves jobs from the queue and runs them with retry and dead-lettering.
pub struct Worker {
    queue: Arc<dyn JobQueue>,
    handler: Arc<dyn JobHandler>,
    settings: JobSettings,
}

impl Worker {
    pub fn new(queue: Arc<dyn JobQueue>, handler: Arc<dyn JobHandler>, settings: JobSettings) -> Self {
        Self {
            queue,
            handler,
            settings,
        }
    }

    /// Start `concurrency` loops that run until `shutdown` flips to true.
    pub fn spawn(self: Arc<Self>, shutdown: watch::Receiver<bool>) -> Vec<JoinHandle<()>> {
        (0..self.settings.concurrency.max(1))
            .map(|worker_id| {
                let worker = self.clone();
                let shutdown = shutdown.clone();
                tokio::spawn(async move { worker.run_loop(worker_id, shutdown).await })
            })
            .collect()
    }

    async fn run_loop(&self, worker_id: usize, mut shutdown: watch::Receiver<bool>) {
        let idle = Duration::from_millis(self.settings.poll_interval_ms.max(10));
        debug!(worker_id, "Job worker started");

        loop {
            if *shutdown.borrow() {
                break;
            }

            let processed = match self.process_next().await {
                Ok(processed) => processed,
                Err(e) => {
                    warn!(worker_id, error = %e, "Job queue unavailable");
                    false
                }
            };

            if !processed {
                tokio::select! {
                    _ = tokio::time::sleep(idle) => {}
                    _ = shutdown.changed() => {}
                }
            }
        }

        debug!(worker_id, "Job worker stopped");
    }

    /// Reserve and run a single job. Returns `false` when the queue was empty.
    pub async fn process_next(&self) -> Result<bool, QueueError> {
        match self.queue.reserve().await? {
            Some(reserved) => {
                self.process(reserved).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn process(&self, reserved: ReservedJob) -> Result<(), QueueError> {
        let kind = reserved.envelope.job.kind();
        let job_id = reserved.envelope.id;

        match self.handler.handle(&reserved.envelope.job).await {
            Ok(()) => {
                debug!(%job_id, kind, "Job completed");
                metrics::record_job(kind, "completed");
            }
            Err(e) => {
                let mut envelope = reserved.envelope.clone();
                // Re-park before ack so a crash in between duplicates instead of losing the job
                if envelope.record_failure(e.to_string()) {
                    let delay = backoff_delay(
                        envelope.attempts,
                        Duration::from_millis(self.settings.backoff_base_ms),
                        Duration::from_millis(self.settings.backoff_max_ms),
                    );
                    warn!(
                        %job_id,
                        kind,
                        attempts = envelope.attempts,
                        retry_in_ms = delay.as_millis() as u64,
                        error = %e,
                        "Job failed, retrying"
                    );
                    self.queue.enqueue_delayed(&envelope, delay).await?;
                    metrics::record_job(kind, "retried");
                } else {
                    error!(
                        %job_id,
                        kind,
                        attempts = envelope.attempts,
                        error = %e,
                        "Job exhausted its attempts, moved to dead letter"
                    );
                    self.queue.dead_letter(&envelope).await?;
                    metrics::record_job(kind, "dead");
                }
            }
        }

        self.queue.ack(&reserved).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::jobs::JobEnvelope;
    use crate::config::Settings;
    use crate::infrastructure::queue::MemoryJobQueue;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Fails the first `failures` calls.
    struct FlakyHandler {
        failures: u32,
        calls: AtomicU32,
    }

    #[async_trait]
    impl JobHandler for FlakyHandler {
        async fn handle(&self, _job: &Job) -> Result<(), AppError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                Err(AppError::Internal("transient".into()))
            } else {
                Ok(())
            }
        }
    }

    fn settings(max_attempts: u32) -> JobSettings {
        let mut settings = Settings::for_tests("0123456789abcdef0123456789abcdef")
            .unwrap()
            .jobs;
        settings.max_attempts = max_attempts;
        settings.backoff_base_ms = 0;
        settings.backoff_max_ms = 0;
        settings
    }

    fn worker(queue: Arc<MemoryJobQueue>, failures: u32, max_attempts: u32) -> (Worker, Arc<FlakyHandler>) {
        let handler = Arc::new(FlakyHandler {
            failures,
            calls: AtomicU32::new(0),
        });
        let worker = Worker::new(queue, handler.clone(), settings(max_attempts));
        (worker, handler)
    }

    #[tokio::test]
    async fn test_successful_job_is_acked() {
        let queue = Arc::new(MemoryJobQueue::new());
        queue.enqueue(&JobEnvelope::new(Job::Cleanup, 3)).await.unwrap();
        let (worker, handler) = worker(queue.clone(), 0, 3);

        assert!(worker.process_next().await.unwrap());
        assert!(!worker.process_next().await.unwrap());
        assert_eq!(handler.calls.load(Ordering::SeqCst), 1);

        let depth = queue.depth().await.unwrap();
        assert_eq!(depth.ready + depth.in_flight + depth.delayed + depth.dead, 0);
    }

    #[tokio::test]
    async fn test_failed_job_is_retried_then_succeeds() {
        let queue = Arc::new(MemoryJobQueue::new());
        queue.enqueue(&JobEnvelope::new(Job::Cleanup, 3)).await.unwrap();
        let (worker, handler) = worker(queue.clone(), 1, 3);

        assert!(worker.process_next().await.unwrap());
        assert_eq!(queue.depth().await.unwrap().delayed, 1);

        // Zero backoff: promotable immediately
        tokio::time::sleep(Duration::from_millis(2)).await;
        assert_eq!(queue.promote_due().await.unwrap(), 1);
        assert!(worker.process_next().await.unwrap());

        assert_eq!(handler.calls.load(Ordering::SeqCst), 2);
        assert_eq!(queue.depth().await.unwrap(), Default::default());
    }

    #[tokio::test]
    async fn test_exhausted_job_is_dead_lettered() {
        let queue = Arc::new(MemoryJobQueue::new());
        queue.enqueue(&JobEnvelope::new(Job::Cleanup, 1)).await.unwrap();
        let (worker, _) = worker(queue.clone(), 5, 1);

        assert!(worker.process_next().await.unwrap());
        let depth = queue.depth().await.unwrap();
        assert_eq!(depth.dead, 1);
        assert_eq!(depth.in_flight, 0);
        assert_eq!(depth.delayed, 0);

        let dead = queue.dead_jobs();
        assert_eq!(dead[0].attempts, 1);
        assert!(dead[0].last_error.as_deref().unwrap().contains("transient"));
    }
}
