//! # Domain Services
//!
//! Domain services encapsulate business logic that doesn't naturally
//! belong to a single entity.
//!
//! ## Services
//!
//! - **AccessPolicy**: team, project, comment and attachment authorization rules

mod access_policy;

pub use access_policy::*;
