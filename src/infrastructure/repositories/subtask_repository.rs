//! Subtask Repository Implementation

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::domain::{Subtask, SubtaskRepository};
use crate::shared::error::AppError;

#[derive(Debug, sqlx::FromRow)]
struct SubtaskRow {
    id: i64,
    task_id: i64,
    title: String,
    is_completed: bool,
    position: i32,
    created_by: i64,
    completed_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    deleted_at: Option<DateTime<Utc>>,
}

impl From<SubtaskRow> for Subtask {
    fn from(row: SubtaskRow) -> Self {
        Subtask {
            id: row.id,
            task_id: row.task_id,
            title: row.title,
            is_completed: row.is_completed,
            position: row.position,
            created_by: row.created_by,
            completed_at: row.completed_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
            deleted_at: row.deleted_at,
        }
    }
}

/// PostgreSQL subtask repository implementation.
#[derive(Clone)]
pub struct PgSubtaskRepository {
    pool: PgPool,
}

impl PgSubtaskRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SubtaskRepository for PgSubtaskRepository {
    async fn create(&self, subtask: &Subtask) -> Result<Subtask, AppError> {
        let row = sqlx::query_as::<_, SubtaskRow>(
            r#"
            INSERT INTO subtasks (id, task_id, title, is_completed, position, created_by,
                                  completed_at, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING id, task_id, title, is_completed, position, created_by, completed_at,
                      created_at, updated_at, deleted_at
            "#,
        )
        .bind(subtask.id)
        .bind(subtask.task_id)
        .bind(&subtask.title)
        .bind(subtask.is_completed)
        .bind(subtask.position)
        .bind(subtask.created_by)
        .bind(subtask.completed_at)
        .bind(subtask.created_at)
        .bind(subtask.updated_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into())
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Subtask>, AppError> {
        let row = sqlx::query_as::<_, SubtaskRow>(
            r#"
            SELECT id, task_id, title, is_completed, position, created_by, completed_at,
                   created_at, updated_at, deleted_at
            FROM subtasks
            WHERE id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    async fn list_for_task(&self, task_id: i64) -> Result<Vec<Subtask>, AppError> {
        let rows = sqlx::query_as::<_, SubtaskRow>(
            r#"
            SELECT id, task_id, title, is_completed, position, created_by, completed_at,
                   created_at, updated_at, deleted_at
            FROM subtasks
            WHERE task_id = $1 AND deleted_at IS NULL
            ORDER BY position ASC, created_at ASC, id ASC
            "#,
        )
        .bind(task_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn update(&self, subtask: &Subtask) -> Result<Subtask, AppError> {
        let row = sqlx::query_as::<_, SubtaskRow>(
            r#"
            UPDATE subtasks
            SET title = $2, is_completed = $3, position = $4, completed_at = $5, updated_at = $6
            WHERE id = $1 AND deleted_at IS NULL
            RETURNING id, task_id, title, is_completed, position, created_by, completed_at,
                      created_at, updated_at, deleted_at
            "#,
        )
        .bind(subtask.id)
        .bind(&subtask.title)
        .bind(subtask.is_completed)
        .bind(subtask.position)
        .bind(subtask.completed_at)
        .bind(subtask.updated_at)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Subtask {} not found", subtask.id)))?;

        Ok(row.into())
    }

    async fn soft_delete(&self, id: i64, at: DateTime<Utc>) -> Result<(), AppError> {
        sqlx::query("UPDATE subtasks SET deleted_at = $2 WHERE id = $1 AND deleted_at IS NULL")
            .bind(id)
            .bind(at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn purge_deleted(&self, before: DateTime<Utc>) -> Result<u64, AppError> {
        let result =
            sqlx::query("DELETE FROM subtasks WHERE deleted_at IS NOT NULL AND deleted_at < $1")
                .bind(before)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected())
    }
}
