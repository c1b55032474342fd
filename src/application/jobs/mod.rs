//! Background Jobs
//!
//! At-least-once job processing for notification delivery and periodic
//! maintenance.
//!
//! ```text
//!  services ──enqueue──► ready ──reserve──► in-flight ──ack──► (gone)
//!                          ▲                    │
//!                          │ promote_due        │ failure
//!                        delayed ◄──backoff─────┤
//!                                               └──max attempts──► dead
//! ```

mod scheduler;
mod worker;

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::Notification;

pub use scheduler::Scheduler;
pub use worker::{JobDispatcher, JobHandler, Worker};

/// Work items carried by the queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Job {
    /// Persist and push one notification; the id is assigned before enqueueing
    DeliverNotification { notification: Notification },

    /// Purge soft-deleted records, old notifications and stale sessions
    Cleanup,

    /// Notify assignees about tasks that are due soon
    DueDateReminders,
}

impl Job {
    pub fn kind(&self) -> &'static str {
        match self {
            Job::DeliverNotification { .. } => "deliver_notification",
            Job::Cleanup => "cleanup",
            Job::DueDateReminders => "due_date_reminders",
        }
    }
}

/// A job plus its delivery bookkeeping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobEnvelope {
    /// Time-ordered (v7)
    pub id: Uuid,
    pub job: Job,
    /// Failed attempts so far
    pub attempts: u32,
    pub max_attempts: u32,
    pub enqueued_at: DateTime<Utc>,
    pub last_error: Option<String>,
}

impl JobEnvelope {
    pub fn new(job: Job, max_attempts: u32) -> Self {
        Self {
            id: Uuid::now_v7(),
            job,
            attempts: 0,
            max_attempts: max_attempts.max(1),
            enqueued_at: Utc::now(),
            last_error: None,
        }
    }

    /// Record a failure. Returns `true` while the job may still be retried.
    pub fn record_failure(&mut self, error: impl Into<String>) -> bool {
        self.attempts += 1;
        self.last_error = Some(error.into());
        self.attempts < self.max_attempts
    }
}

/// A job taken off the ready list. `raw` is the exact stored payload,
/// needed to remove it from the in-flight list on ack.
#[derive(Debug, Clone)]
pub struct ReservedJob {
    pub envelope: JobEnvelope,
    pub raw: String,
}

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("Queue backend error: {0}")]
    Backend(#[from] redis::RedisError),

    #[error("Job serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Queue depth by list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueueDepth {
    pub ready: u64,
    pub in_flight: u64,
    pub delayed: u64,
    pub dead: u64,
}

/// Durable job queue.
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Append to the ready list.
    async fn enqueue(&self, envelope: &JobEnvelope) -> Result<(), QueueError>;

    /// Park in the delayed set until `delay` has passed.
    async fn enqueue_delayed(&self, envelope: &JobEnvelope, delay: Duration)
        -> Result<(), QueueError>;

    /// Move the oldest ready job to the in-flight list.
    async fn reserve(&self) -> Result<Option<ReservedJob>, QueueError>;

    /// Remove a reserved job from the in-flight list.
    async fn ack(&self, job: &ReservedJob) -> Result<(), QueueError>;

    /// Move delayed jobs whose time has come to the ready list. Returns how many moved.
    async fn promote_due(&self) -> Result<u64, QueueError>;

    /// Return every in-flight job to the ready list (crash recovery at startup).
    async fn requeue_inflight(&self) -> Result<u64, QueueError>;

    /// Store a job that exhausted its attempts.
    async fn dead_letter(&self, envelope: &JobEnvelope) -> Result<(), QueueError>;

    async fn depth(&self) -> Result<QueueDepth, QueueError>;

    async fn ping(&self) -> Result<(), QueueError>;
}

/// Retry delay after `attempts` failures: `min(base * 2^(attempts-1), max)` plus
/// up to 10% jitter.
pub fn backoff_delay(attempts: u32, base: Duration, max: Duration) -> Duration {
    let exponent = attempts.saturating_sub(1).min(31);
    let delay = base
        .checked_mul(1u32 << exponent)
        .unwrap_or(max)
        .min(max);
    let jitter_cap = (delay.as_millis() as u64 / 10).max(1);
    let jitter = rand::rng().random_range(0..jitter_cap);
    delay + Duration::from_millis(jitter)
}
