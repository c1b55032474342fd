//! Attachment Repository Implementation
//!
//! PostgreSQL implementation of attachment metadata operations.
//! File content lives in the file storage under `storage_key`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use super::map_unique_violation;
use crate::domain::{Attachment, AttachmentRepository};
use crate::shared::error::AppError;

/// Database row for the attachments table.
#[derive(Debug, Clone, sqlx::FromRow)]
struct AttachmentRow {
    id: i64,
    task_id: i64,
    uploaded_by: i64,
    filename: String,
    content_type: String,
    size: i64,
    storage_key: String,
    checksum: String,
    created_at: DateTime<Utc>,
    deleted_at: Option<DateTime<Utc>>,
}

impl AttachmentRow {
    fn into_attachment(self) -> Attachment {
        Attachment {
            id: self.id,
            task_id: self.task_id,
            uploaded_by: self.uploaded_by,
            filename: self.filename,
            content_type: self.content_type,
            size: self.size,
            storage_key: self.storage_key,
            checksum: self.checksum,
            created_at: self.created_at,
            deleted_at: self.deleted_at,
        }
    }
}

/// PostgreSQL implementation of the AttachmentRepository.
#[derive(Clone)]
pub struct PgAttachmentRepository {
    pool: PgPool,
}

impl PgAttachmentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AttachmentRepository for PgAttachmentRepository {
    async fn create(&self, attachment: &Attachment) -> Result<Attachment, AppError> {
        let row = sqlx::query_as::<_, AttachmentRow>(
            r#"
            INSERT INTO attachments (id, task_id, uploaded_by, filename, content_type, size,
                                     storage_key, checksum, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING id, task_id, uploaded_by, filename, content_type, size, storage_key,
                      checksum, created_at, deleted_at
            "#,
        )
        .bind(attachment.id)
        .bind(attachment.task_id)
        .bind(attachment.uploaded_by)
        .bind(&attachment.filename)
        .bind(&attachment.content_type)
        .bind(attachment.size)
        .bind(&attachment.storage_key)
        .bind(&attachment.checksum)
        .bind(attachment.created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_unique_violation(e, "Storage key already in use"))?;

        Ok(row.into_attachment())
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Attachment>, AppError> {
        let row = sqlx::query_as::<_, AttachmentRow>(
            r#"
            SELECT id, task_id, uploaded_by, filename, content_type, size, storage_key,
                   checksum, created_at, deleted_at
            FROM attachments
            WHERE id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.into_attachment()))
    }

    async fn list_for_task(&self, task_id: i64) -> Result<Vec<Attachment>, AppError> {
        let rows = sqlx::query_as::<_, AttachmentRow>(
            r#"
            SELECT id, task_id, uploaded_by, filename, content_type, size, storage_key,
                   checksum, created_at, deleted_at
            FROM attachments
            WHERE task_id = $1 AND deleted_at IS NULL
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(task_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.into_attachment()).collect())
    }

    async fn soft_delete(&self, id: i64, at: DateTime<Utc>) -> Result<(), AppError> {
        sqlx::query("UPDATE attachments SET deleted_at = $2 WHERE id = $1 AND deleted_at IS NULL")
            .bind(id)
            .bind(at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Runs before the parent purges so the cascading deletes cannot orphan stored files.
    async fn purge_deleted(&self, before: DateTime<Utc>) -> Result<Vec<Attachment>, AppError> {
        let rows = sqlx::query_as::<_, AttachmentRow>(
            r#"
            DELETE FROM attachments a
            USING tasks t, projects p, teams tm
            WHERE t.id = a.task_id
              AND p.id = t.project_id
              AND tm.id = p.team_id
              AND (a.deleted_at < $1 OR t.deleted_at < $1 OR p.deleted_at < $1 OR tm.deleted_at < $1)
            RETURNING a.id, a.task_id, a.uploaded_by, a.filename, a.content_type, a.size,
                      a.storage_key, a.checksum, a.created_at, a.deleted_at
            "#,
        )
        .bind(before)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.into_attachment()).collect())
    }
}
