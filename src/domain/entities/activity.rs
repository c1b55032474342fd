//! Activity log entity and repository trait.
//!
//! Maps to the `activities` table in the database schema. Append-only.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::shared::error::AppError;
use crate::shared::pagination::{Page, PageRequest};

/// Kind of record an activity or notification refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityType {
    Team,
    Project,
    Task,
    Subtask,
    Comment,
    Attachment,
}

impl EntityType {
    /// Convert from database string representation.
    pub fn from_str(s: &str) -> Self {
        match s {
            "team" => Self::Team,
            "project" => Self::Project,
            "subtask" => Self::Subtask,
            "comment" => Self::Comment,
            "attachment" => Self::Attachment,
            _ => Self::Task,
        }
    }

    /// Convert to database string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Team => "team",
            Self::Project => "project",
            Self::Task => "task",
            Self::Subtask => "subtask",
            Self::Comment => "comment",
            Self::Attachment => "attachment",
        }
    }
}

impl std::fmt::Display for EntityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// What happened to the entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityAction {
    Created,
    Updated,
    Deleted,
    Restored,
    StatusChanged,
    Assigned,
    Completed,
    MemberAdded,
    MemberRemoved,
    MemberRoleChanged,
}

impl ActivityAction {
    /// Convert from database string representation.
    pub fn from_str(s: &str) -> Self {
        match s {
            "created" => Self::Created,
            "deleted" => Self::Deleted,
            "restored" => Self::Restored,
            "status_changed" => Self::StatusChanged,
            "assigned" => Self::Assigned,
            "completed" => Self::Completed,
            "member_added" => Self::MemberAdded,
            "member_removed" => Self::MemberRemoved,
            "member_role_changed" => Self::MemberRoleChanged,
            _ => Self::Updated,
        }
    }

    /// Convert to database string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Updated => "updated",
            Self::Deleted => "deleted",
            Self::Restored => "restored",
            Self::StatusChanged => "status_changed",
            Self::Assigned => "assigned",
            Self::Completed => "completed",
            Self::MemberAdded => "member_added",
            Self::MemberRemoved => "member_removed",
            Self::MemberRoleChanged => "member_role_changed",
        }
    }
}

impl std::fmt::Display for ActivityAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One entry of the activity log.
///
/// Maps to the `activities` table:
/// - id: BIGINT PRIMARY KEY (Snowflake ID)
/// - actor_id: BIGINT NOT NULL REFERENCES users(id)
/// - team_id / project_id / task_id: BIGINT NULL (scope of the event)
/// - entity_type: VARCHAR(16) NOT NULL
/// - entity_id: BIGINT NOT NULL
/// - action: VARCHAR(32) NOT NULL
/// - metadata: JSONB NOT NULL
/// - created_at: TIMESTAMPTZ NOT NULL
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    pub id: i64,
    pub actor_id: i64,
    pub team_id: Option<i64>,
    pub project_id: Option<i64>,
    pub task_id: Option<i64>,
    pub entity_type: EntityType,
    pub entity_id: i64,
    pub action: ActivityAction,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// Repository trait for Activity data access operations.
#[async_trait]
pub trait ActivityRepository: Send + Sync {
    async fn append(&self, activity: &Activity) -> Result<(), AppError>;

    /// Activity of a project, newest first.
    async fn list_for_project(
        &self,
        project_id: i64,
        page: PageRequest,
    ) -> Result<Page<Activity>, AppError>;

    /// Activity of a task, newest first.
    async fn list_for_task(&self, task_id: i64, page: PageRequest)
        -> Result<Page<Activity>, AppError>;
}
