//! Activity Repository Implementation
//!
//! Append-only log; rows are never updated.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::domain::{Activity, ActivityAction, ActivityRepository, EntityType};
use crate::shared::error::AppError;
use crate::shared::pagination::{Page, PageRequest};

#[derive(Debug, sqlx::FromRow)]
struct ActivityRow {
    id: i64,
    actor_id: i64,
    team_id: Option<i64>,
    project_id: Option<i64>,
    task_id: Option<i64>,
    entity_type: String,
    entity_id: i64,
    action: String,
    metadata: serde_json::Value,
    created_at: DateTime<Utc>,
}

impl ActivityRow {
    fn into_activity(self) -> Activity {
        Activity {
            id: self.id,
            actor_id: self.actor_id,
            team_id: self.team_id,
            project_id: self.project_id,
            task_id: self.task_id,
            entity_type: EntityType::from_str(&self.entity_type),
            entity_id: self.entity_id,
            action: ActivityAction::from_str(&self.action),
            metadata: self.metadata,
            created_at: self.created_at,
        }
    }
}

/// PostgreSQL activity repository implementation.
#[derive(Clone)]
pub struct PgActivityRepository {
    pool: PgPool,
}

impl PgActivityRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Page of activities where `column` equals `id`. `column` is never client input.
    async fn list_by(
        &self,
        column: &'static str,
        id: i64,
        page: PageRequest,
    ) -> Result<Page<Activity>, AppError> {
        let total: i64 =
            sqlx::query_scalar(&format!("SELECT COUNT(*) FROM activities WHERE {column} = $1"))
                .bind(id)
                .fetch_one(&self.pool)
                .await?;

        let rows = sqlx::query_as::<_, ActivityRow>(&format!(
            r#"
            SELECT id, actor_id, team_id, project_id, task_id, entity_type, entity_id,
                   action, metadata, created_at
            FROM activities
            WHERE {column} = $1
            ORDER BY created_at DESC, id DESC
            LIMIT $2 OFFSET $3
            "#
        ))
        .bind(id)
        .bind(page.limit_i64())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;

        Ok(Page::new(
            rows.into_iter().map(|r| r.into_activity()).collect(),
            page,
            total,
        ))
    }
}

#[async_trait]
impl ActivityRepository for PgActivityRepository {
    async fn append(&self, activity: &Activity) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO activities (id, actor_id, team_id, project_id, task_id, entity_type,
                                    entity_id, action, metadata, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(activity.id)
        .bind(activity.actor_id)
        .bind(activity.team_id)
        .bind(activity.project_id)
        .bind(activity.task_id)
        .bind(activity.entity_type.as_str())
        .bind(activity.entity_id)
        .bind(activity.action.as_str())
        .bind(&activity.metadata)
        .bind(activity.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_for_project(
        &self,
        project_id: i64,
        page: PageRequest,
    ) -> Result<Page<Activity>, AppError> {
        self.list_by("project_id", project_id, page).await
    }

    async fn list_for_task(
        &self,
        task_id: i64,
        page: PageRequest,
    ) -> Result<Page<Activity>, AppError> {
        self.list_by("task_id", task_id, page).await
    }
}
