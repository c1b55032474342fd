//! Project Repository Implementation
//!
//! PostgreSQL implementation of the ProjectRepository trait.
//! Listing applies the same visibility rule as the access policy: team owners
//! and admins see every project of the team, other team members only the
//! projects they were added to.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder};

use super::{like_contains, map_unique_violation};
use crate::domain::{
    Project, ProjectFilter, ProjectMember, ProjectRepository, ProjectRole, ProjectStats,
    ProjectStatus,
};
use crate::shared::error::AppError;
use crate::shared::pagination::{Page, PageRequest};

const PROJECT_COLUMNS: &str = "p.id, p.team_id, p.name, p.description, p.status, p.owner_id, \
                               p.start_date, p.due_date, p.created_at, p.updated_at, p.deleted_at";

#[derive(Debug, sqlx::FromRow)]
struct ProjectRow {
    id: i64,
    team_id: i64,
    name: String,
    description: Option<String>,
    status: String,
    owner_id: i64,
    start_date: Option<NaiveDate>,
    due_date: Option<NaiveDate>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    deleted_at: Option<DateTime<Utc>>,
}

impl ProjectRow {
    fn into_project(self, members: Vec<ProjectMember>) -> Project {
        Project {
            id: self.id,
            team_id: self.team_id,
            name: self.name,
            description: self.description,
            status: ProjectStatus::from_str(&self.status),
            owner_id: self.owner_id,
            start_date: self.start_date,
            due_date: self.due_date,
            members,
            created_at: self.created_at,
            updated_at: self.updated_at,
            deleted_at: self.deleted_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ProjectMemberRow {
    project_id: i64,
    user_id: i64,
    role: String,
    added_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
struct StatsRow {
    total: i64,
    todo: i64,
    in_progress: i64,
    in_review: i64,
    done: i64,
    overdue: i64,
}

/// PostgreSQL project repository implementation.
#[derive(Clone)]
pub struct PgProjectRepository {
    pool: PgPool,
}

impl PgProjectRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn members_of(
        &self,
        project_ids: &[i64],
    ) -> Result<HashMap<i64, Vec<ProjectMember>>, AppError> {
        let rows = sqlx::query_as::<_, ProjectMemberRow>(
            r#"
            SELECT project_id, user_id, role, added_at
            FROM project_members
            WHERE project_id = ANY($1)
            ORDER BY added_at ASC, user_id ASC
            "#,
        )
        .bind(project_ids)
        .fetch_all(&self.pool)
        .await?;

        let mut grouped: HashMap<i64, Vec<ProjectMember>> = HashMap::new();
        for row in rows {
            grouped.entry(row.project_id).or_default().push(ProjectMember {
                user_id: row.user_id,
                role: ProjectRole::from_str(&row.role),
                added_at: row.added_at,
            });
        }
        Ok(grouped)
    }

    /// Shared FROM/WHERE clause of the listing and its count.
    fn push_list_conditions(qb: &mut QueryBuilder<'static, Postgres>, filter: &ProjectFilter) {
        qb.push(
            " FROM projects p \
              INNER JOIN teams t ON t.id = p.team_id AND t.deleted_at IS NULL \
              INNER JOIN team_members tm ON tm.team_id = p.team_id AND tm.user_id = ",
        );
        qb.push_bind(filter.viewer_id);
        qb.push(" WHERE p.deleted_at IS NULL AND (tm.role IN ('owner', 'admin') OR EXISTS (SELECT 1 FROM project_members pm WHERE pm.project_id = p.id AND pm.user_id = ");
        qb.push_bind(filter.viewer_id);
        qb.push("))");

        if let Some(team_id) = filter.team_id {
            qb.push(" AND p.team_id = ");
            qb.push_bind(team_id);
        }
        if let Some(status) = filter.status {
            qb.push(" AND p.status = ");
            qb.push_bind(status.as_str());
        }
        if let Some(q) = filter.q.as_deref().filter(|q| !q.is_empty()) {
            qb.push(" AND p.name ILIKE ");
            qb.push_bind(like_contains(q));
        }
    }
}

#[async_trait]
impl ProjectRepository for PgProjectRepository {
    async fn create(&self, project: &Project) -> Result<Project, AppError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, ProjectRow>(&format!(
            r#"
            INSERT INTO projects AS p (id, team_id, name, description, status, owner_id,
                                       start_date, due_date, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING {PROJECT_COLUMNS}
            "#
        ))
        .bind(project.id)
        .bind(project.team_id)
        .bind(&project.name)
        .bind(&project.description)
        .bind(project.status.as_str())
        .bind(project.owner_id)
        .bind(project.start_date)
        .bind(project.due_date)
        .bind(project.created_at)
        .bind(project.updated_at)
        .fetch_one(&mut *tx)
        .await?;

        for member in &project.members {
            sqlx::query(
                r#"
                INSERT INTO project_members (project_id, user_id, role, added_at)
                VALUES ($1, $2, $3, $4)
                "#,
            )
            .bind(project.id)
            .bind(member.user_id)
            .bind(member.role.as_str())
            .bind(member.added_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(row.into_project(project.members.clone()))
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Project>, AppError> {
        let row = sqlx::query_as::<_, ProjectRow>(&format!(
            r#"
            SELECT {PROJECT_COLUMNS}
            FROM projects p
            INNER JOIN teams t ON t.id = p.team_id AND t.deleted_at IS NULL
            WHERE p.id = $1 AND p.deleted_at IS NULL
            "#
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => {
                let members = self.members_of(&[row.id]).await?.remove(&row.id);
                Ok(Some(row.into_project(members.unwrap_or_default())))
            }
            None => Ok(None),
        }
    }

    async fn list(
        &self,
        filter: &ProjectFilter,
        page: PageRequest,
    ) -> Result<Page<Project>, AppError> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*)");
        Self::push_list_conditions(&mut count, filter);
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        let mut select = QueryBuilder::<Postgres>::new(format!("SELECT {PROJECT_COLUMNS}"));
        Self::push_list_conditions(&mut select, filter);
        select.push(" ORDER BY p.created_at DESC, p.id DESC LIMIT ");
        select.push_bind(page.limit_i64());
        select.push(" OFFSET ");
        select.push_bind(page.offset());
        let rows: Vec<ProjectRow> = select.build_query_as().fetch_all(&self.pool).await?;

        let ids: Vec<i64> = rows.iter().map(|r| r.id).collect();
        let mut members = self.members_of(&ids).await?;
        let items = rows
            .into_iter()
            .map(|row| {
                let project_members = members.remove(&row.id).unwrap_or_default();
                row.into_project(project_members)
            })
            .collect();
        Ok(Page::new(items, page, total))
    }

    async fn update(&self, project: &Project) -> Result<Project, AppError> {
        let row = sqlx::query_as::<_, ProjectRow>(&format!(
            r#"
            UPDATE projects p
            SET name = $2, description = $3, status = $4, start_date = $5, due_date = $6,
                updated_at = $7
            WHERE p.id = $1 AND p.deleted_at IS NULL
            RETURNING {PROJECT_COLUMNS}
            "#
        ))
        .bind(project.id)
        .bind(&project.name)
        .bind(&project.description)
        .bind(project.status.as_str())
        .bind(project.start_date)
        .bind(project.due_date)
        .bind(project.updated_at)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Project {} not found", project.id)))?;

        Ok(row.into_project(project.members.clone()))
    }

    async fn soft_delete(&self, id: i64, at: DateTime<Utc>) -> Result<(), AppError> {
        sqlx::query("UPDATE projects SET deleted_at = $2 WHERE id = $1 AND deleted_at IS NULL")
            .bind(id)
            .bind(at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn add_member(&self, project_id: i64, member: &ProjectMember) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO project_members (project_id, user_id, role, added_at)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(project_id)
        .bind(member.user_id)
        .bind(member.role.as_str())
        .bind(member.added_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_unique_violation(e, "User is already a member of this project"))?;
        Ok(())
    }

    async fn update_member_role(
        &self,
        project_id: i64,
        user_id: i64,
        role: ProjectRole,
    ) -> Result<(), AppError> {
        let result = sqlx::query(
            "UPDATE project_members SET role = $3 WHERE project_id = $1 AND user_id = $2",
        )
        .bind(project_id)
        .bind(user_id)
        .bind(role.as_str())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Project member not found".into()));
        }
        Ok(())
    }

    async fn remove_member(&self, project_id: i64, user_id: i64) -> Result<(), AppError> {
        sqlx::query("DELETE FROM project_members WHERE project_id = $1 AND user_id = $2")
            .bind(project_id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn stats(&self, project_id: i64, now: DateTime<Utc>) -> Result<ProjectStats, AppError> {
        let row = sqlx::query_as::<_, StatsRow>(
            r#"
            SELECT
                COUNT(*)                                                AS total,
                COUNT(*) FILTER (WHERE status = 'todo')                 AS todo,
                COUNT(*) FILTER (WHERE status = 'in_progress')          AS in_progress,
                COUNT(*) FILTER (WHERE status = 'in_review')            AS in_review,
                COUNT(*) FILTER (WHERE status = 'done')                 AS done,
                COUNT(*) FILTER (WHERE status <> 'done' AND due_date < $2) AS overdue
            FROM tasks
            WHERE project_id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(project_id)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        Ok(ProjectStats {
            total: row.total,
            todo: row.todo,
            in_progress: row.in_progress,
            in_review: row.in_review,
            done: row.done,
            overdue: row.overdue,
        })
    }

    /// Foreign keys cascade to tasks and their content.
    async fn purge_deleted(&self, before: DateTime<Utc>) -> Result<u64, AppError> {
        let result =
            sqlx::query("DELETE FROM projects WHERE deleted_at IS NOT NULL AND deleted_at < $1")
                .bind(before)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected())
    }
}
