//! Infrastructure Layer
//!
//! Implementations of the application's outbound ports:
//! - Database repositories (PostgreSQL, in-memory)
//! - Job queues (Redis, in-memory)
//! - Attachment storage on local disk
//! - Prometheus metrics

pub mod database;
pub mod metrics;
pub mod queue;
pub mod repositories;
pub mod storage;
