//! Task Repository Implementation
//!
//! PostgreSQL implementation of the TaskRepository trait.
//! Listing composes its WHERE clause with `QueryBuilder`; the sort column comes
//! from a fixed whitelist, never from client text.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder};

use super::like_contains;
use crate::domain::{
    Task, TaskFilter, TaskPriority, TaskRepository, TaskSort, TaskSortField, TaskStatus,
};
use crate::shared::error::AppError;
use crate::shared::pagination::{Page, PageRequest};

const TASK_COLUMNS: &str = "t.id, t.project_id, t.title, t.description, t.status, t.priority, \
                            t.reporter_id, t.assignee_ids, t.tags, t.due_date, t.position, \
                            t.estimated_hours, t.completed_at, t.reminder_sent_at, t.created_at, \
                            t.updated_at, t.deleted_at";

const PRIORITY_RANK: &str =
    "CASE t.priority WHEN 'urgent' THEN 3 WHEN 'high' THEN 2 WHEN 'medium' THEN 1 ELSE 0 END";

#[derive(Debug, sqlx::FromRow)]
struct TaskRow {
    id: i64,
    project_id: i64,
    title: String,
    description: Option<String>,
    status: String,
    priority: String,
    reporter_id: i64,
    assignee_ids: Vec<i64>,
    tags: Vec<String>,
    due_date: Option<DateTime<Utc>>,
    position: i32,
    estimated_hours: Option<f64>,
    completed_at: Option<DateTime<Utc>>,
    reminder_sent_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    deleted_at: Option<DateTime<Utc>>,
}

impl TaskRow {
    fn into_task(self) -> Task {
        Task {
            id: self.id,
            project_id: self.project_id,
            title: self.title,
            description: self.description,
            status: TaskStatus::from_str(&self.status),
            priority: TaskPriority::from_str(&self.priority),
            reporter_id: self.reporter_id,
            assignee_ids: self.assignee_ids,
            tags: self.tags,
            due_date: self.due_date,
            position: self.position,
            estimated_hours: self.estimated_hours,
            completed_at: self.completed_at,
            reminder_sent_at: self.reminder_sent_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
            deleted_at: self.deleted_at,
        }
    }
}

/// SQL ORDER BY for a sort spec. Ties break on id in the same direction.
fn order_by(sort: TaskSort) -> String {
    let column = match sort.field {
        TaskSortField::CreatedAt => "t.created_at",
        TaskSortField::UpdatedAt => "t.updated_at",
        TaskSortField::DueDate => "t.due_date",
        TaskSortField::Priority => PRIORITY_RANK,
        TaskSortField::Position => "t.position",
    };
    let direction = sort.order.as_sql();
    let nulls = match sort.field {
        TaskSortField::DueDate => " NULLS LAST",
        _ => "",
    };
    format!(" ORDER BY {column} {direction}{nulls}, t.id {direction}")
}

/// PostgreSQL task repository implementation.
#[derive(Clone)]
pub struct PgTaskRepository {
    pool: PgPool,
}

impl PgTaskRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn push_filter(qb: &mut QueryBuilder<'static, Postgres>, filter: &TaskFilter) {
        qb.push(" FROM tasks t WHERE t.deleted_at IS NULL AND t.project_id = ");
        qb.push_bind(filter.project_id);

        if let Some(status) = filter.status {
            qb.push(" AND t.status = ");
            qb.push_bind(status.as_str());
        }
        if let Some(priority) = filter.priority {
            qb.push(" AND t.priority = ");
            qb.push_bind(priority.as_str());
        }
        if let Some(assignee_id) = filter.assignee_id {
            qb.push(" AND ");
            qb.push_bind(assignee_id);
            qb.push(" = ANY(t.assignee_ids)");
        }
        if let Some(tag) = filter.tag.clone() {
            qb.push(" AND ");
            qb.push_bind(tag);
            qb.push(" = ANY(t.tags)");
        }
        if let Some(before) = filter.due_before {
            qb.push(" AND t.due_date <= ");
            qb.push_bind(before);
        }
        if let Some(after) = filter.due_after {
            qb.push(" AND t.due_date >= ");
            qb.push_bind(after);
        }
        if let Some(q) = filter.q.as_deref().filter(|q| !q.is_empty()) {
            qb.push(" AND t.title ILIKE ");
            qb.push_bind(like_contains(q));
        }
    }

    async fn fetch(&self, id: i64, include_deleted: bool) -> Result<Option<Task>, AppError> {
        let deleted_clause = if include_deleted { "" } else { " AND t.deleted_at IS NULL" };
        let row = sqlx::query_as::<_, TaskRow>(&format!(
            "SELECT {TASK_COLUMNS} FROM tasks t WHERE t.id = $1{deleted_clause}"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.into_task()))
    }
}

#[async_trait]
impl TaskRepository for PgTaskRepository {
    async fn create(&self, task: &Task) -> Result<Task, AppError> {
        let row = sqlx::query_as::<_, TaskRow>(&format!(
            r#"
            INSERT INTO tasks AS t (id, project_id, title, description, status, priority,
                                    reporter_id, assignee_ids, tags, due_date, position,
                                    estimated_hours, completed_at, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            RETURNING {TASK_COLUMNS}
            "#
        ))
        .bind(task.id)
        .bind(task.project_id)
        .bind(&task.title)
        .bind(&task.description)
        .bind(task.status.as_str())
        .bind(task.priority.as_str())
        .bind(task.reporter_id)
        .bind(&task.assignee_ids)
        .bind(&task.tags)
        .bind(task.due_date)
        .bind(task.position)
        .bind(task.estimated_hours)
        .bind(task.completed_at)
        .bind(task.created_at)
        .bind(task.updated_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into_task())
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Task>, AppError> {
        self.fetch(id, false).await
    }

    async fn find_by_id_with_deleted(&self, id: i64) -> Result<Option<Task>, AppError> {
        self.fetch(id, true).await
    }

    async fn list(
        &self,
        filter: &TaskFilter,
        sort: TaskSort,
        page: PageRequest,
    ) -> Result<Page<Task>, AppError> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*)");
        Self::push_filter(&mut count, filter);
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        let mut select = QueryBuilder::<Postgres>::new(format!("SELECT {TASK_COLUMNS}"));
        Self::push_filter(&mut select, filter);
        select.push(order_by(sort));
        select.push(" LIMIT ");
        select.push_bind(page.limit_i64());
        select.push(" OFFSET ");
        select.push_bind(page.offset());
        let rows: Vec<TaskRow> = select.build_query_as().fetch_all(&self.pool).await?;

        Ok(Page::new(
            rows.into_iter().map(|r| r.into_task()).collect(),
            page,
            total,
        ))
    }

    async fn max_position(&self, project_id: i64) -> Result<Option<i32>, AppError> {
        let max: Option<i32> = sqlx::query_scalar(
            "SELECT MAX(position) FROM tasks WHERE project_id = $1 AND deleted_at IS NULL",
        )
        .bind(project_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(max)
    }

    async fn update(&self, task: &Task) -> Result<Task, AppError> {
        let row = sqlx::query_as::<_, TaskRow>(&format!(
            r#"
            UPDATE tasks t
            SET title = $2, description = $3, status = $4, priority = $5, assignee_ids = $6,
                tags = $7, due_date = $8, position = $9, estimated_hours = $10,
                completed_at = $11, reminder_sent_at = $12, updated_at = $13
            WHERE t.id = $1 AND t.deleted_at IS NULL
            RETURNING {TASK_COLUMNS}
            "#
        ))
        .bind(task.id)
        .bind(&task.title)
        .bind(&task.description)
        .bind(task.status.as_str())
        .bind(task.priority.as_str())
        .bind(&task.assignee_ids)
        .bind(&task.tags)
        .bind(task.due_date)
        .bind(task.position)
        .bind(task.estimated_hours)
        .bind(task.completed_at)
        .bind(task.reminder_sent_at)
        .bind(task.updated_at)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Task {} not found", task.id)))?;

        Ok(row.into_task())
    }

    async fn soft_delete(&self, id: i64, at: DateTime<Utc>) -> Result<(), AppError> {
        sqlx::query("UPDATE tasks SET deleted_at = $2 WHERE id = $1 AND deleted_at IS NULL")
            .bind(id)
            .bind(at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn restore(&self, id: i64) -> Result<(), AppError> {
        sqlx::query("UPDATE tasks SET deleted_at = NULL, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn due_for_reminder(
        &self,
        now: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<Task>, AppError> {
        let rows = sqlx::query_as::<_, TaskRow>(&format!(
            r#"
            SELECT {TASK_COLUMNS}
            FROM tasks t
            INNER JOIN projects p ON p.id = t.project_id AND p.deleted_at IS NULL
            INNER JOIN teams tm ON tm.id = p.team_id AND tm.deleted_at IS NULL
            WHERE t.deleted_at IS NULL
              AND t.status <> 'done'
              AND t.reminder_sent_at IS NULL
              AND t.due_date > $1 AND t.due_date <= $2
            ORDER BY t.due_date ASC, t.id ASC
            "#
        ))
        .bind(now)
        .bind(until)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.into_task()).collect())
    }

    async fn mark_reminded(&self, ids: &[i64], at: DateTime<Utc>) -> Result<(), AppError> {
        if ids.is_empty() {
            return Ok(());
        }
        sqlx::query("UPDATE tasks SET reminder_sent_at = $2 WHERE id = ANY($1)")
            .bind(ids)
            .bind(at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Foreign keys cascade to subtasks, comments and attachments.
    async fn purge_deleted(&self, before: DateTime<Utc>) -> Result<u64, AppError> {
        let result =
            sqlx::query("DELETE FROM tasks WHERE deleted_at IS NOT NULL AND deleted_at < $1")
                .bind(before)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected())
    }
}
