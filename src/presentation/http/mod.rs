//! HTTP Layer
//!
//! REST routes, request extractors and handlers.

pub mod extractors;
pub mod handlers;
pub mod routes;
