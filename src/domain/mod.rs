//! # Domain Layer
//!
//! The domain layer contains the core business rules of the task server.
//! It is independent of any external frameworks or infrastructure concerns.
//!
//! ## Structure
//!
//! - **entities**: Core domain entities (User, Team, Project, Task, etc.)
//! - **value_objects**: Immutable value types (filters, sort orders)
//! - **services**: Domain services (access policy)
//! - **repositories**: The bundle of repository trait objects
//!
//! ## Design Principles
//!
//! - No dependencies on infrastructure or presentation layers
//! - Repository traits define data access contracts
//! - Entities encapsulate domain behavior

pub mod entities;
pub mod repositories;
pub mod services;
pub mod value_objects;

// Re-export commonly used types
pub use entities::*;
pub use repositories::Repositories;
pub use value_objects::*;
