//! # Domain Value Objects
//!
//! Immutable value types that represent domain concepts without identity.
//!
//! ## Value Objects
//!
//! - **ProjectFilter / TaskFilter**: listing conditions
//! - **TaskSort**: whitelisted sort field and direction

mod filters;

pub use filters::*;
