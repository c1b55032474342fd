//! In-process job queue.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::application::jobs::{JobEnvelope, JobQueue, QueueDepth, QueueError, ReservedJob};

#[derive(Default)]
struct QueueState {
    ready: VecDeque<String>,
    in_flight: Vec<String>,
    delayed: Vec<(Instant, String)>,
    dead: Vec<String>,
}

/// Queue kept in process memory. Jobs are lost on restart.
#[derive(Default)]
pub struct MemoryJobQueue {
    state: Mutex<QueueState>,
}

impl MemoryJobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Jobs that exhausted their attempts, oldest first.
    pub fn dead_jobs(&self) -> Vec<JobEnvelope> {
        self.state
            .lock()
            .dead
            .iter()
            .filter_map(|raw| serde_json::from_str(raw).ok())
            .collect()
    }
}

#[async_trait]
impl JobQueue for MemoryJobQueue {
    async fn enqueue(&self, envelope: &JobEnvelope) -> Result<(), QueueError> {
        let raw = serde_json::to_string(envelope)?;
        self.state.lock().ready.push_back(raw);
        Ok(())
    }

    async fn enqueue_delayed(
        &self,
        envelope: &JobEnvelope,
        delay: Duration,
    ) -> Result<(), QueueError> {
        let raw = serde_json::to_string(envelope)?;
        self.state.lock().delayed.push((Instant::now() + delay, raw));
        Ok(())
    }

    async fn reserve(&self) -> Result<Option<ReservedJob>, QueueError> {
        let mut state = self.state.lock();
        let Some(raw) = state.ready.pop_front() else {
            return Ok(None);
        };
        match serde_json::from_str::<JobEnvelope>(&raw) {
            Ok(envelope) => {
                state.in_flight.push(raw.clone());
                Ok(Some(ReservedJob { envelope, raw }))
            }
            Err(e) => {
                // Unreadable payloads go straight to the dead list
                state.dead.push(raw);
                Err(e.into())
            }
        }
    }

    async fn ack(&self, job: &ReservedJob) -> Result<(), QueueError> {
        let mut state = self.state.lock();
        if let Some(pos) = state.in_flight.iter().position(|raw| *raw == job.raw) {
            state.in_flight.remove(pos);
        }
        Ok(())
    }

    async fn promote_due(&self) -> Result<u64, QueueError> {
        let now = Instant::now();
        let mut state = self.state.lock();
        let (mut due, pending): (Vec<_>, Vec<_>) = std::mem::take(&mut state.delayed)
            .into_iter()
            .partition(|(at, _)| *at <= now);
        state.delayed = pending;
        due.sort_by_key(|(at, _)| *at);

        let moved = due.len() as u64;
        state.ready.extend(due.into_iter().map(|(_, raw)| raw));
        Ok(moved)
    }

    async fn requeue_inflight(&self) -> Result<u64, QueueError> {
        let mut state = self.state.lock();
        let in_flight = std::mem::take(&mut state.in_flight);
        let moved = in_flight.len() as u64;
        for raw in in_flight.into_iter().rev() {
            state.ready.push_front(raw);
        }
        Ok(moved)
    }

    async fn dead_letter(&self, envelope: &JobEnvelope) -> Result<(), QueueError> {
        let raw = serde_json::to_string(envelope)?;
        self.state.lock().dead.push(raw);
        Ok(())
    }

    async fn depth(&self) -> Result<QueueDepth, QueueError> {
        let state = self.state.lock();
        Ok(QueueDepth {
            ready: state.ready.len() as u64,
            in_flight: state.in_flight.len() as u64,
            delayed: state.delayed.len() as u64,
            dead: state.dead.len() as u64,
        })
    }

    async fn ping(&self) -> Result<(), QueueError> {
        Ok(())
    }
}
