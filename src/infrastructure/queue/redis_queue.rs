//! Redis-backed job queue.
//!
//! Layout under `{prefix}:jobs:`
//!
//! | key        | type | contents                                   |
//! |------------|------|--------------------------------------------|
//! | `ready`    | list | new jobs pushed left, reserved from right  |
//! | `inflight` | list | reserved, not yet acknowledged             |
//! | `delayed`  | zset | retries, scored by due time in epoch ms    |
//! | `dead`     | list | jobs that exhausted their attempts         |
//!
//! Reservation is a single `LMOVE` so a crash between reserve and ack leaves
//! the job in `inflight`, where [`JobQueue::requeue_inflight`] finds it on the
//! next start.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};
use tracing::{info, instrument, warn};

use crate::application::jobs::{JobEnvelope, JobQueue, QueueDepth, QueueError, ReservedJob};
use crate::config::RedisSettings;

/// Upper bound on jobs moved by one promotion pass.
const PROMOTE_BATCH: usize = 500;

const PROMOTE_SCRIPT: &str = r#"
local due = redis.call('ZRANGEBYSCORE', KEYS[1], '-inf', ARGV[1], 'LIMIT', 0, ARGV[2])
for _, job in ipairs(due) do
    redis.call('ZREM', KEYS[1], job)
    redis.call('LPUSH', KEYS[2], job)
end
return #due
"#;

// Newest in-flight sits on the left; moving left-to-right keeps the oldest
// closest to the reserve end of `ready`.
const REQUEUE_SCRIPT: &str = r#"
local moved = 0
while redis.call('LMOVE', KEYS[1], KEYS[2], 'LEFT', 'RIGHT') do
    moved = moved + 1
end
return moved
"#;

/// Creates a Redis connection manager with automatic reconnection.
#[instrument(skip(settings))]
pub async fn create_redis_client(
    settings: &RedisSettings,
) -> Result<ConnectionManager, redis::RedisError> {
    info!("Connecting to Redis...");
    let client = Client::open(settings.url.as_deref().unwrap_or_default())?;
    let manager = ConnectionManager::new(client).await?;
    info!("Redis connection established");
    Ok(manager)
}

#[derive(Clone)]
pub struct RedisJobQueue {
    conn: ConnectionManager,
    ready: String,
    in_flight: String,
    delayed: String,
    dead: String,
}

impl RedisJobQueue {
    pub fn new(conn: ConnectionManager, key_prefix: &str) -> Self {
        let key = |name: &str| format!("{}:jobs:{}", key_prefix, name);
        Self {
            conn,
            ready: key("ready"),
            in_flight: key("inflight"),
            delayed: key("delayed"),
            dead: key("dead"),
        }
    }
}

#[async_trait]
impl JobQueue for RedisJobQueue {
    async fn enqueue(&self, envelope: &JobEnvelope) -> Result<(), QueueError> {
        let raw = serde_json::to_string(envelope)?;
        let mut conn = self.conn.clone();
        let _: () = conn.lpush(&self.ready, raw).await?;
        Ok(())
    }

    async fn enqueue_delayed(
        &self,
        envelope: &JobEnvelope,
        delay: Duration,
    ) -> Result<(), QueueError> {
        let raw = serde_json::to_string(envelope)?;
        let due_ms = Utc::now().timestamp_millis() + delay.as_millis() as i64;
        let mut conn = self.conn.clone();
        let _: () = conn.zadd(&self.delayed, raw, due_ms).await?;
        Ok(())
    }

    async fn reserve(&self) -> Result<Option<ReservedJob>, QueueError> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = redis::cmd("LMOVE")
            .arg(&self.ready)
            .arg(&self.in_flight)
            .arg("RIGHT")
            .arg("LEFT")
            .query_async(&mut conn)
            .await?;

        let Some(raw) = raw else {
            return Ok(None);
        };
        match serde_json::from_str::<JobEnvelope>(&raw) {
            Ok(envelope) => Ok(Some(ReservedJob { envelope, raw })),
            Err(e) => {
                warn!(error = %e, "Moving unreadable job to dead list");
                let _: () = redis::pipe()
                    .atomic()
                    .lrem(&self.in_flight, 1, &raw)
                    .ignore()
                    .rpush(&self.dead, &raw)
                    .ignore()
                    .query_async(&mut conn)
                    .await?;
                Err(e.into())
            }
        }
    }

    async fn ack(&self, job: &ReservedJob) -> Result<(), QueueError> {
        let mut conn = self.conn.clone();
        let _: i64 = conn.lrem(&self.in_flight, 1, &job.raw).await?;
        Ok(())
    }

    async fn promote_due(&self) -> Result<u64, QueueError> {
        let mut conn = self.conn.clone();
        let moved: u64 = redis::Script::new(PROMOTE_SCRIPT)
            .key(&self.delayed)
            .key(&self.ready)
            .arg(Utc::now().timestamp_millis())
            .arg(PROMOTE_BATCH)
            .invoke_async(&mut conn)
            .await?;
        Ok(moved)
    }

    async fn requeue_inflight(&self) -> Result<u64, QueueError> {
        let mut conn = self.conn.clone();
        let moved: u64 = redis::Script::new(REQUEUE_SCRIPT)
            .key(&self.in_flight)
            .key(&self.ready)
            .invoke_async(&mut conn)
            .await?;
        Ok(moved)
    }

    async fn dead_letter(&self, envelope: &JobEnvelope) -> Result<(), QueueError> {
        let raw = serde_json::to_string(envelope)?;
        let mut conn = self.conn.clone();
        let _: () = conn.rpush(&self.dead, raw).await?;
        Ok(())
    }

    async fn depth(&self) -> Result<QueueDepth, QueueError> {
        let mut conn = self.conn.clone();
        let (ready, in_flight, delayed, dead): (u64, u64, u64, u64) = redis::pipe()
            .llen(&self.ready)
            .llen(&self.in_flight)
            .zcard(&self.delayed)
            .llen(&self.dead)
            .query_async(&mut conn)
            .await?;
        Ok(QueueDepth {
            ready,
            in_flight,
            delayed,
            dead,
        })
    }

    async fn ping(&self) -> Result<(), QueueError> {
        let mut conn = self.conn.clone();
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }
}
