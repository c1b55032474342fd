//! Job Queue Backends
//!
//! Implementations of [`JobQueue`](crate::application::jobs::JobQueue):
//!
//! - [`RedisJobQueue`]: durable lists in Redis, survives restarts
//! - [`MemoryJobQueue`]: process-local, for tests and single-node development
//!
//! Both store jobs as their serialized JSON so acknowledgement can remove the
//! exact payload that was reserved.

mod memory_queue;
mod redis_queue;

pub use memory_queue::MemoryJobQueue;
pub use redis_queue::{create_redis_client, RedisJobQueue};
