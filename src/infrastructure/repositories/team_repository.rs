//! Team Repository Implementation
//!
//! PostgreSQL implementation of the TeamRepository trait.
//! Teams are loaded together with their `team_members` rows.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use super::map_unique_violation;
use crate::domain::{Team, TeamMember, TeamRepository, TeamRole};
use crate::shared::error::AppError;

#[derive(Debug, sqlx::FromRow)]
struct TeamRow {
    id: i64,
    name: String,
    description: Option<String>,
    owner_id: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    deleted_at: Option<DateTime<Utc>>,
}

impl TeamRow {
    fn into_team(self, members: Vec<TeamMember>) -> Team {
        Team {
            id: self.id,
            name: self.name,
            description: self.description,
            owner_id: self.owner_id,
            members,
            created_at: self.created_at,
            updated_at: self.updated_at,
            deleted_at: self.deleted_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct TeamMemberRow {
    team_id: i64,
    user_id: i64,
    role: String,
    joined_at: DateTime<Utc>,
}

impl TeamMemberRow {
    fn into_member(self) -> TeamMember {
        TeamMember {
            user_id: self.user_id,
            role: TeamRole::from_str(&self.role),
            joined_at: self.joined_at,
        }
    }
}

/// PostgreSQL team repository implementation.
#[derive(Clone)]
pub struct PgTeamRepository {
    pool: PgPool,
}

impl PgTeamRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Members of every team in `team_ids`, grouped by team, oldest first.
    async fn members_of(&self, team_ids: &[i64]) -> Result<HashMap<i64, Vec<TeamMember>>, AppError> {
        let rows = sqlx::query_as::<_, TeamMemberRow>(
            r#"
            SELECT team_id, user_id, role, joined_at
            FROM team_members
            WHERE team_id = ANY($1)
            ORDER BY joined_at ASC, user_id ASC
            "#,
        )
        .bind(team_ids)
        .fetch_all(&self.pool)
        .await?;

        let mut grouped: HashMap<i64, Vec<TeamMember>> = HashMap::new();
        for row in rows {
            grouped.entry(row.team_id).or_default().push(row.into_member());
        }
        Ok(grouped)
    }
}

#[async_trait]
impl TeamRepository for PgTeamRepository {
    async fn create(&self, team: &Team) -> Result<Team, AppError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, TeamRow>(
            r#"
            INSERT INTO teams (id, name, description, owner_id, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, name, description, owner_id, created_at, updated_at, deleted_at
            "#,
        )
        .bind(team.id)
        .bind(&team.name)
        .bind(&team.description)
        .bind(team.owner_id)
        .bind(team.created_at)
        .bind(team.updated_at)
        .fetch_one(&mut *tx)
        .await?;

        for member in &team.members {
            sqlx::query(
                r#"
                INSERT INTO team_members (team_id, user_id, role, joined_at)
                VALUES ($1, $2, $3, $4)
                "#,
            )
            .bind(team.id)
            .bind(member.user_id)
            .bind(member.role.as_str())
            .bind(member.joined_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(row.into_team(team.members.clone()))
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Team>, AppError> {
        let row = sqlx::query_as::<_, TeamRow>(
            r#"
            SELECT id, name, description, owner_id, created_at, updated_at, deleted_at
            FROM teams
            WHERE id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => {
                let mut members = self.members_of(&[row.id]).await?;
                let members = members.remove(&row.id).unwrap_or_default();
                Ok(Some(row.into_team(members)))
            }
            None => Ok(None),
        }
    }

    async fn list_for_user(&self, user_id: i64) -> Result<Vec<Team>, AppError> {
        let rows = sqlx::query_as::<_, TeamRow>(
            r#"
            SELECT t.id, t.name, t.description, t.owner_id, t.created_at, t.updated_at, t.deleted_at
            FROM teams t
            INNER JOIN team_members tm ON tm.team_id = t.id
            WHERE tm.user_id = $1 AND t.deleted_at IS NULL
            ORDER BY t.created_at ASC, t.id ASC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        let ids: Vec<i64> = rows.iter().map(|r| r.id).collect();
        let mut members = self.members_of(&ids).await?;
        Ok(rows
            .into_iter()
            .map(|row| {
                let team_members = members.remove(&row.id).unwrap_or_default();
                row.into_team(team_members)
            })
            .collect())
    }

    async fn update(&self, team: &Team) -> Result<Team, AppError> {
        let row = sqlx::query_as::<_, TeamRow>(
            r#"
            UPDATE teams
            SET name = $2, description = $3, updated_at = $4
            WHERE id = $1 AND deleted_at IS NULL
            RETURNING id, name, description, owner_id, created_at, updated_at, deleted_at
            "#,
        )
        .bind(team.id)
        .bind(&team.name)
        .bind(&team.description)
        .bind(team.updated_at)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Team {} not found", team.id)))?;

        Ok(row.into_team(team.members.clone()))
    }

    async fn soft_delete(&self, id: i64, at: DateTime<Utc>) -> Result<(), AppError> {
        sqlx::query("UPDATE teams SET deleted_at = $2 WHERE id = $1 AND deleted_at IS NULL")
            .bind(id)
            .bind(at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn add_member(&self, team_id: i64, member: &TeamMember) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO team_members (team_id, user_id, role, joined_at)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(team_id)
        .bind(member.user_id)
        .bind(member.role.as_str())
        .bind(member.joined_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_unique_violation(e, "User is already a member of this team"))?;
        Ok(())
    }

    async fn update_member_role(
        &self,
        team_id: i64,
        user_id: i64,
        role: TeamRole,
    ) -> Result<(), AppError> {
        let result =
            sqlx::query("UPDATE team_members SET role = $3 WHERE team_id = $1 AND user_id = $2")
                .bind(team_id)
                .bind(user_id)
                .bind(role.as_str())
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Team member not found".into()));
        }
        Ok(())
    }

    async fn remove_member(&self, team_id: i64, user_id: i64) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            DELETE FROM project_members
            WHERE user_id = $2
              AND project_id IN (SELECT id FROM projects WHERE team_id = $1)
            "#,
        )
        .bind(team_id)
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM team_members WHERE team_id = $1 AND user_id = $2")
            .bind(team_id)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Foreign keys cascade from teams down to projects, tasks and their content.
    async fn purge_deleted(&self, before: DateTime<Utc>) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM teams WHERE deleted_at IS NOT NULL AND deleted_at < $1")
            .bind(before)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
