//! Comment entity and repository trait.
//!
//! Maps to the `comments` table in the database schema.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::shared::error::AppError;
use crate::shared::pagination::{Page, PageRequest};

/// Maximum comment length in characters.
pub const MAX_COMMENT_LENGTH: usize = 5000;

/// Represents a comment on a task.
///
/// Maps to the `comments` table:
/// - id: BIGINT PRIMARY KEY (Snowflake ID)
/// - task_id: BIGINT NOT NULL REFERENCES tasks(id)
/// - author_id: BIGINT NOT NULL REFERENCES users(id)
/// - content: TEXT NOT NULL (1-5000 characters)
/// - mentions: BIGINT[] NOT NULL
/// - edited_at, deleted_at: TIMESTAMPTZ NULL
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: i64,
    pub task_id: i64,
    pub author_id: i64,
    pub content: String,

    /// Users mentioned in the comment
    pub mentions: Vec<i64>,

    pub edited_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Comment {
    pub fn new(id: i64, task_id: i64, author_id: i64, content: String, mentions: Vec<i64>) -> Self {
        let now = Utc::now();
        Self {
            id,
            task_id,
            author_id,
            content,
            mentions,
            edited_at: None,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    pub fn is_edited(&self) -> bool {
        self.edited_at.is_some()
    }
}

/// Repository trait for Comment data access operations.
#[async_trait]
pub trait CommentRepository: Send + Sync {
    async fn create(&self, comment: &Comment) -> Result<Comment, AppError>;

    /// Find a live comment.
    async fn find_by_id(&self, id: i64) -> Result<Option<Comment>, AppError>;

    /// Live comments of a task, oldest first.
    async fn list_for_task(&self, task_id: i64, page: PageRequest)
        -> Result<Page<Comment>, AppError>;

    async fn update(&self, comment: &Comment) -> Result<Comment, AppError>;

    async fn soft_delete(&self, id: i64, at: DateTime<Utc>) -> Result<(), AppError>;

    async fn purge_deleted(&self, before: DateTime<Utc>) -> Result<u64, AppError>;
}
