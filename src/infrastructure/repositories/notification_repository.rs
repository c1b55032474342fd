//! Notification Repository Implementation
//!
//! PostgreSQL implementation of the NotificationRepository trait.
//! Inserts are idempotent on the notification id so redelivered jobs do not
//! produce duplicates.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::domain::{EntityType, Notification, NotificationKind, NotificationRepository};
use crate::shared::error::AppError;
use crate::shared::pagination::{Page, PageRequest};

#[derive(Debug, sqlx::FromRow)]
struct NotificationRow {
    id: i64,
    user_id: i64,
    actor_id: Option<i64>,
    kind: String,
    title: String,
    body: Option<String>,
    entity_type: String,
    entity_id: i64,
    read_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl NotificationRow {
    fn into_notification(self) -> Result<Notification, AppError> {
        let kind = NotificationKind::from_str(&self.kind).ok_or_else(|| {
            AppError::Internal(format!("Unknown notification kind '{}'", self.kind))
        })?;
        Ok(Notification {
            id: self.id,
            user_id: self.user_id,
            actor_id: self.actor_id,
            kind,
            title: self.title,
            body: self.body,
            entity_type: EntityType::from_str(&self.entity_type),
            entity_id: self.entity_id,
            read_at: self.read_at,
            created_at: self.created_at,
        })
    }
}

/// PostgreSQL notification repository implementation.
#[derive(Clone)]
pub struct PgNotificationRepository {
    pool: PgPool,
}

impl PgNotificationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl NotificationRepository for PgNotificationRepository {
    async fn insert_if_absent(&self, notification: &Notification) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            INSERT INTO notifications (id, user_id, actor_id, kind, title, body, entity_type,
                                       entity_id, read_at, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(notification.id)
        .bind(notification.user_id)
        .bind(notification.actor_id)
        .bind(notification.kind.as_str())
        .bind(&notification.title)
        .bind(&notification.body)
        .bind(notification.entity_type.as_str())
        .bind(notification.entity_id)
        .bind(notification.read_at)
        .bind(notification.created_at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Notification>, AppError> {
        let row = sqlx::query_as::<_, NotificationRow>(
            r#"
            SELECT id, user_id, actor_id, kind, title, body, entity_type, entity_id,
                   read_at, created_at
            FROM notifications
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| r.into_notification()).transpose()
    }

    async fn list_for_user(
        &self,
        user_id: i64,
        unread_only: bool,
        page: PageRequest,
    ) -> Result<Page<Notification>, AppError> {
        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM notifications
            WHERE user_id = $1 AND (NOT $2 OR read_at IS NULL)
            "#,
        )
        .bind(user_id)
        .bind(unread_only)
        .fetch_one(&self.pool)
        .await?;

        let rows = sqlx::query_as::<_, NotificationRow>(
            r#"
            SELECT id, user_id, actor_id, kind, title, body, entity_type, entity_id,
                   read_at, created_at
            FROM notifications
            WHERE user_id = $1 AND (NOT $2 OR read_at IS NULL)
            ORDER BY created_at DESC, id DESC
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(user_id)
        .bind(unread_only)
        .bind(page.limit_i64())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;

        let items = rows
            .into_iter()
            .map(|r| r.into_notification())
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Page::new(items, page, total))
    }

    async fn unread_count(&self, user_id: i64) -> Result<i64, AppError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM notifications WHERE user_id = $1 AND read_at IS NULL",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    async fn mark_read(&self, id: i64, at: DateTime<Utc>) -> Result<(), AppError> {
        sqlx::query("UPDATE notifications SET read_at = $2 WHERE id = $1 AND read_at IS NULL")
            .bind(id)
            .bind(at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn mark_all_read(&self, user_id: i64, at: DateTime<Utc>) -> Result<u64, AppError> {
        let result = sqlx::query(
            "UPDATE notifications SET read_at = $2 WHERE user_id = $1 AND read_at IS NULL",
        )
        .bind(user_id)
        .bind(at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn delete(&self, id: i64) -> Result<(), AppError> {
        sqlx::query("DELETE FROM notifications WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn purge_read(&self, before: DateTime<Utc>) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM notifications WHERE read_at IS NOT NULL AND read_at < $1")
            .bind(before)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
