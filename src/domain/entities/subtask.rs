//! Subtask entity and repository trait.
//!
//! Maps to the `subtasks` table in the database schema.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::shared::error::AppError;

/// A checklist item of a task.
///
/// Maps to the `subtasks` table:
/// - id: BIGINT PRIMARY KEY (Snowflake ID)
/// - task_id: BIGINT NOT NULL REFERENCES tasks(id)
/// - title: VARCHAR(200) NOT NULL
/// - is_completed: BOOLEAN NOT NULL
/// - position: INTEGER NOT NULL
/// - created_by: BIGINT NOT NULL REFERENCES users(id)
/// - completed_at, deleted_at: TIMESTAMPTZ NULL
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subtask {
    pub id: i64,
    pub task_id: i64,
    pub title: String,
    pub is_completed: bool,
    pub position: i32,
    pub created_by: i64,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Subtask {
    pub fn new(id: i64, task_id: i64, title: String, position: i32, created_by: i64) -> Self {
        let now = Utc::now();
        Self {
            id,
            task_id,
            title,
            is_completed: false,
            position,
            created_by,
            completed_at: None,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    /// Toggle completion, maintaining `completed_at`.
    pub fn set_completed(&mut self, completed: bool, at: DateTime<Utc>) {
        if self.is_completed == completed {
            return;
        }
        self.is_completed = completed;
        self.completed_at = completed.then_some(at);
    }
}

/// Repository trait for Subtask data access operations.
#[async_trait]
pub trait SubtaskRepository: Send + Sync {
    async fn create(&self, subtask: &Subtask) -> Result<Subtask, AppError>;

    /// Find a live subtask.
    async fn find_by_id(&self, id: i64) -> Result<Option<Subtask>, AppError>;

    /// Live subtasks of a task ordered by position, then creation.
    async fn list_for_task(&self, task_id: i64) -> Result<Vec<Subtask>, AppError>;

    async fn update(&self, subtask: &Subtask) -> Result<Subtask, AppError>;

    async fn soft_delete(&self, id: i64, at: DateTime<Utc>) -> Result<(), AppError>;

    async fn purge_deleted(&self, before: DateTime<Utc>) -> Result<u64, AppError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_completed() {
        let mut subtask = Subtask::new(1, 2, "Check links".into(), 0, 3);
        let now = Utc::now();

        subtask.set_completed(true, now);
        assert!(subtask.is_completed);
        assert_eq!(subtask.completed_at, Some(now));

        subtask.set_completed(false, now);
        assert!(!subtask.is_completed);
        assert!(subtask.completed_at.is_none());
    }
}
