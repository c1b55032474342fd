//! Project entity and repository trait.
//!
//! Maps to the `projects` and `project_members` tables in the database schema.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::value_objects::ProjectFilter;
use crate::shared::error::AppError;
use crate::shared::pagination::{Page, PageRequest};

/// Lifecycle status of a project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    #[default]
    Active,
    OnHold,
    Completed,
    Archived,
}

impl ProjectStatus {
    /// Convert from database string representation.
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "on_hold" => Self::OnHold,
            "completed" => Self::Completed,
            "archived" => Self::Archived,
            _ => Self::Active,
        }
    }

    /// Convert to database string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::OnHold => "on_hold",
            Self::Completed => "completed",
            Self::Archived => "archived",
        }
    }
}

impl std::fmt::Display for ProjectStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Role of a user inside a project. Ordered by privilege.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectRole {
    Viewer,
    Contributor,
    Manager,
}

impl ProjectRole {
    /// Convert from database string representation.
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "manager" => Self::Manager,
            "contributor" => Self::Contributor,
            _ => Self::Viewer,
        }
    }

    /// Convert to database string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Viewer => "viewer",
            Self::Contributor => "contributor",
            Self::Manager => "manager",
        }
    }
}

impl std::fmt::Display for ProjectRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A user's explicit membership in a project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectMember {
    pub user_id: i64,
    pub role: ProjectRole,
    pub added_at: DateTime<Utc>,
}

impl ProjectMember {
    pub fn new(user_id: i64, role: ProjectRole) -> Self {
        Self {
            user_id,
            role,
            added_at: Utc::now(),
        }
    }
}

/// Represents a project inside a team.
///
/// Maps to the `projects` table:
/// - id: BIGINT PRIMARY KEY (Snowflake ID)
/// - team_id: BIGINT NOT NULL REFERENCES teams(id)
/// - name: VARCHAR(100) NOT NULL
/// - description: TEXT NULL
/// - status: VARCHAR(16) NOT NULL DEFAULT 'active'
/// - owner_id: BIGINT NOT NULL REFERENCES users(id)
/// - start_date / due_date: DATE NULL
/// - created_at / updated_at: TIMESTAMPTZ NOT NULL
/// - deleted_at: TIMESTAMPTZ NULL (soft delete)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: i64,
    pub team_id: i64,
    pub name: String,
    pub description: Option<String>,
    pub status: ProjectStatus,
    pub owner_id: i64,
    pub start_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,

    /// Loaded from `project_members`
    #[serde(default)]
    pub members: Vec<ProjectMember>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Project {
    /// Create a new active project; the creator becomes its manager.
    pub fn new(id: i64, team_id: i64, name: String, owner_id: i64) -> Self {
        let now = Utc::now();
        Self {
            id,
            team_id,
            name,
            description: None,
            status: ProjectStatus::Active,
            owner_id,
            start_date: None,
            due_date: None,
            members: vec![ProjectMember {
                user_id: owner_id,
                role: ProjectRole::Manager,
                added_at: now,
            }],
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    pub fn member(&self, user_id: i64) -> Option<&ProjectMember> {
        self.members.iter().find(|m| m.user_id == user_id)
    }

    /// Explicit project role of `user_id`, ignoring team-derived access.
    pub fn role_of(&self, user_id: i64) -> Option<ProjectRole> {
        self.member(user_id).map(|m| m.role)
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// Task counters shown on the project dashboard.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProjectStats {
    pub total: i64,
    pub todo: i64,
    pub in_progress: i64,
    pub in_review: i64,
    pub done: i64,

    /// Not done and past their due date
    pub overdue: i64,
}

/// Repository trait for Project data access operations.
///
/// Reads never return soft-deleted projects or projects of soft-deleted teams.
#[async_trait]
pub trait ProjectRepository: Send + Sync {
    /// Create a project together with its member rows.
    async fn create(&self, project: &Project) -> Result<Project, AppError>;

    /// Find a live project with its members.
    async fn find_by_id(&self, id: i64) -> Result<Option<Project>, AppError>;

    /// Projects visible to `filter.viewer_id`, newest first.
    async fn list(&self, filter: &ProjectFilter, page: PageRequest)
        -> Result<Page<Project>, AppError>;

    /// Update name, description, status and dates.
    async fn update(&self, project: &Project) -> Result<Project, AppError>;

    async fn soft_delete(&self, id: i64, at: DateTime<Utc>) -> Result<(), AppError>;

    /// Add a member. Conflicts if already a member.
    async fn add_member(&self, project_id: i64, member: &ProjectMember) -> Result<(), AppError>;

    async fn update_member_role(
        &self,
        project_id: i64,
        user_id: i64,
        role: ProjectRole,
    ) -> Result<(), AppError>;

    async fn remove_member(&self, project_id: i64, user_id: i64) -> Result<(), AppError>;

    /// Count live tasks by status; overdue relative to `now`.
    async fn stats(&self, project_id: i64, now: DateTime<Utc>) -> Result<ProjectStats, AppError>;

    /// Physically delete projects soft-deleted before `before`, with everything they own.
    async fn purge_deleted(&self, before: DateTime<Utc>) -> Result<u64, AppError>;
}
