//! HTTP Handlers
//!
//! Request handlers for all HTTP endpoints. Handlers parse ids and query
//! strings, call one service and shape the response; rules live in the
//! services.

pub mod activity;
pub mod attachment;
pub mod auth;
pub mod comment;
pub mod health;
pub mod metrics;
pub mod notification;
pub mod project;
pub mod subtask;
pub mod task;
pub mod team;
pub mod user;
