//! Repository Implementations
//!
//! Concrete implementations of the repository traits defined in the domain
//! layer. Each Postgres repository handles data access for one entity type;
//! the [`memory`] module provides the same contracts without a database.
//!
//! ## Usage Example
//!
//! ```rust,ignore
//! use crate::infrastructure::repositories;
//!
//! let repos = match settings.database.backend {
//!     DatabaseBackend::Postgres => repositories::postgres(pool),
//!     DatabaseBackend::Memory => repositories::memory::repositories(),
//! };
//! ```

pub mod memory;

mod activity_repository;
mod attachment_repository;
mod comment_repository;
mod notification_repository;
mod project_repository;
mod session_repository;
mod subtask_repository;
mod task_repository;
mod team_repository;
mod user_repository;

use std::sync::Arc;

use sqlx::PgPool;

use crate::domain::Repositories;
use crate::shared::error::AppError;

pub use activity_repository::PgActivityRepository;
pub use attachment_repository::PgAttachmentRepository;
pub use comment_repository::PgCommentRepository;
pub use notification_repository::PgNotificationRepository;
pub use project_repository::PgProjectRepository;
pub use session_repository::PgSessionRepository;
pub use subtask_repository::PgSubtaskRepository;
pub use task_repository::PgTaskRepository;
pub use team_repository::PgTeamRepository;
pub use user_repository::PgUserRepository;

/// Repository bundle backed by PostgreSQL.
pub fn postgres(pool: PgPool) -> Repositories {
    Repositories {
        users: Arc::new(PgUserRepository::new(pool.clone())),
        sessions: Arc::new(PgSessionRepository::new(pool.clone())),
        teams: Arc::new(PgTeamRepository::new(pool.clone())),
        projects: Arc::new(PgProjectRepository::new(pool.clone())),
        tasks: Arc::new(PgTaskRepository::new(pool.clone())),
        subtasks: Arc::new(PgSubtaskRepository::new(pool.clone())),
        comments: Arc::new(PgCommentRepository::new(pool.clone())),
        attachments: Arc::new(PgAttachmentRepository::new(pool.clone())),
        notifications: Arc::new(PgNotificationRepository::new(pool.clone())),
        activities: Arc::new(PgActivityRepository::new(pool)),
    }
}

/// Map a unique-constraint violation to `Conflict`, anything else to `Database`.
fn map_unique_violation(e: sqlx::Error, message: &str) -> AppError {
    match &e {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
            AppError::Conflict(message.to_string())
        }
        _ => AppError::Database(e),
    }
}

/// Escape LIKE wildcards in user input.
fn escape_like(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// ILIKE pattern matching values that start with `input`.
fn like_prefix(input: &str) -> String {
    format!("{}%", escape_like(input))
}

/// ILIKE pattern matching values that contain `input`.
fn like_contains(input: &str) -> String {
    format!("%{}%", escape_like(input))
}
