//! Comment Repository Implementation
//!
//! PostgreSQL implementation of the CommentRepository trait.
//! Mentions are stored inline as a `BIGINT[]` column.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::domain::{Comment, CommentRepository};
use crate::shared::error::AppError;
use crate::shared::pagination::{Page, PageRequest};

#[derive(Debug, sqlx::FromRow)]
struct CommentRow {
    id: i64,
    task_id: i64,
    author_id: i64,
    content: String,
    mentions: Vec<i64>,
    edited_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    deleted_at: Option<DateTime<Utc>>,
}

impl CommentRow {
    fn into_comment(self) -> Comment {
        Comment {
            id: self.id,
            task_id: self.task_id,
            author_id: self.author_id,
            content: self.content,
            mentions: self.mentions,
            edited_at: self.edited_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
            deleted_at: self.deleted_at,
        }
    }
}

/// PostgreSQL comment repository implementation.
#[derive(Clone)]
pub struct PgCommentRepository {
    pool: PgPool,
}

impl PgCommentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CommentRepository for PgCommentRepository {
    async fn create(&self, comment: &Comment) -> Result<Comment, AppError> {
        let row = sqlx::query_as::<_, CommentRow>(
            r#"
            INSERT INTO comments (id, task_id, author_id, content, mentions, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, task_id, author_id, content, mentions, edited_at, created_at,
                      updated_at, deleted_at
            "#,
        )
        .bind(comment.id)
        .bind(comment.task_id)
        .bind(comment.author_id)
        .bind(&comment.content)
        .bind(&comment.mentions)
        .bind(comment.created_at)
        .bind(comment.updated_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into_comment())
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Comment>, AppError> {
        let row = sqlx::query_as::<_, CommentRow>(
            r#"
            SELECT id, task_id, author_id, content, mentions, edited_at, created_at,
                   updated_at, deleted_at
            FROM comments
            WHERE id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.into_comment()))
    }

    async fn list_for_task(
        &self,
        task_id: i64,
        page: PageRequest,
    ) -> Result<Page<Comment>, AppError> {
        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM comments WHERE task_id = $1 AND deleted_at IS NULL",
        )
        .bind(task_id)
        .fetch_one(&self.pool)
        .await?;

        let rows = sqlx::query_as::<_, CommentRow>(
            r#"
            SELECT id, task_id, author_id, content, mentions, edited_at, created_at,
                   updated_at, deleted_at
            FROM comments
            WHERE task_id = $1 AND deleted_at IS NULL
            ORDER BY created_at ASC, id ASC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(task_id)
        .bind(page.limit_i64())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;

        Ok(Page::new(
            rows.into_iter().map(|r| r.into_comment()).collect(),
            page,
            total,
        ))
    }

    async fn update(&self, comment: &Comment) -> Result<Comment, AppError> {
        let row = sqlx::query_as::<_, CommentRow>(
            r#"
            UPDATE comments
            SET content = $2, mentions = $3, edited_at = $4, updated_at = $5
            WHERE id = $1 AND deleted_at IS NULL
            RETURNING id, task_id, author_id, content, mentions, edited_at, created_at,
                      updated_at, deleted_at
            "#,
        )
        .bind(comment.id)
        .bind(&comment.content)
        .bind(&comment.mentions)
        .bind(comment.edited_at)
        .bind(comment.updated_at)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Comment {} not found", comment.id)))?;

        Ok(row.into_comment())
    }

    async fn soft_delete(&self, id: i64, at: DateTime<Utc>) -> Result<(), AppError> {
        sqlx::query("UPDATE comments SET deleted_at = $2 WHERE id = $1 AND deleted_at IS NULL")
            .bind(id)
            .bind(at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn purge_deleted(&self, before: DateTime<Utc>) -> Result<u64, AppError> {
        let result =
            sqlx::query("DELETE FROM comments WHERE deleted_at IS NOT NULL AND deleted_at < $1")
                .bind(before)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected())
    }
}
