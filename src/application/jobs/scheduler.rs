//! Periodic job producer.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, warn};

use super::{Job, JobEnvelope, JobQueue};
use crate::config::JobSettings;
use crate::infrastructure::metrics;

/// Promotes delayed jobs and enqueues maintenance work on fixed intervals.
pub struct Scheduler {
    queue: Arc<dyn JobQueue>,
    settings: JobSettings,
}

impl Scheduler {
    pub fn new(queue: Arc<dyn JobQueue>, settings: JobSettings) -> Self {
        Self { queue, settings }
    }

    pub fn spawn(self, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut promote = interval(Duration::from_millis(self.settings.poll_interval_ms.max(10)));
            let mut cleanup = interval(Duration::from_secs(self.settings.cleanup_interval_secs.max(1)));
            let mut reminders =
                interval(Duration::from_secs(self.settings.reminder_interval_secs.max(1)));
            for timer in [&mut promote, &mut cleanup, &mut reminders] {
                timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
            }

            loop {
                tokio::select! {
                    _ = promote.tick() => {
                        match self.queue.promote_due().await {
                            Ok(0) => {}
                            Ok(moved) => debug!(moved, "Promoted delayed jobs"),
                            Err(e) => warn!(error = %e, "Failed to promote delayed jobs"),
                        }
                        if let Ok(depth) = self.queue.depth().await {
                            metrics::set_queue_depth(&depth);
                        }
                    }
                    _ = cleanup.tick() => self.schedule(Job::Cleanup).await,
                    _ = reminders.tick() => self.schedule(Job::DueDateReminders).await,
                    _ = shutdown.changed() => break,
                }
            }

            debug!("Job scheduler stopped");
        })
    }

    async fn schedule(&self, job: Job) {
        let kind = job.kind();
        let envelope = JobEnvelope::new(job, self.settings.max_attempts);
        if let Err(e) = self.queue.enqueue(&envelope).await {
            warn!(kind, error = %e, "Failed to schedule job");
        }
    }
}
