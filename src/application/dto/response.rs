//! Response DTOs
//!
//! Data structures for API response bodies. Snowflake IDs are rendered as
//! strings so JavaScript clients keep full precision.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use crate::application::services::AuthTokens;
use crate::domain::{
    Activity, ActivityAction, Attachment, Comment, EntityType, Notification, NotificationKind,
    Project, ProjectMember, ProjectRole, ProjectStats, ProjectStatus, Subtask, Task, TaskPriority,
    TaskStatus, Team, TeamMember, TeamRole, User,
};
use crate::shared::pagination::Page;

fn ids(values: &[i64]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

/// Authentication tokens response
#[derive(Debug, Clone, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: i64,
    pub token_type: String,
}

impl From<AuthTokens> for TokenResponse {
    fn from(tokens: AuthTokens) -> Self {
        Self {
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
            expires_in: tokens.expires_in,
            token_type: tokens.token_type,
        }
    }
}

/// Registration and login response (user plus tokens)
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub user: UserResponse,
    #[serde(flatten)]
    pub tokens: TokenResponse,
}

/// User response
#[derive(Debug, Clone, Serialize)]
pub struct UserResponse {
    pub id: String,
    pub username: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    pub bio: Option<String>,
    pub last_seen_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl UserResponse {
    pub fn from_user(user: User, include_email: bool) -> Self {
        Self {
            id: user.id.to_string(),
            username: user.username,
            email: if include_email { Some(user.email) } else { None },
            display_name: user.display_name,
            avatar_url: user.avatar_url,
            bio: user.bio,
            last_seen_at: user.last_seen_at,
            created_at: user.created_at,
        }
    }

    /// Public view without the email address.
    pub fn public(user: User) -> Self {
        Self::from_user(user, false)
    }
}

/// Paginated list response
#[derive(Debug, Serialize)]
pub struct PageResponse<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub limit: u32,
    pub total: i64,
    pub total_pages: u32,
}

impl<T, U: Into<T>> From<Page<U>> for PageResponse<T> {
    fn from(page: Page<U>) -> Self {
        let page = page.map(Into::into);
        Self {
            items: page.items,
            page: page.page,
            limit: page.limit,
            total: page.total,
            total_pages: page.total_pages,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TeamMemberResponse {
    pub user_id: String,
    pub role: TeamRole,
    pub joined_at: DateTime<Utc>,
}

impl From<TeamMember> for TeamMemberResponse {
    fn from(member: TeamMember) -> Self {
        Self {
            user_id: member.user_id.to_string(),
            role: member.role,
            joined_at: member.joined_at,
        }
    }
}

/// Team response
#[derive(Debug, Clone, Serialize)]
pub struct TeamResponse {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub owner_id: String,
    pub members: Vec<TeamMemberResponse>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Team> for TeamResponse {
    fn from(team: Team) -> Self {
        Self {
            id: team.id.to_string(),
            name: team.name,
            description: team.description,
            owner_id: team.owner_id.to_string(),
            members: team.members.into_iter().map(Into::into).collect(),
            created_at: team.created_at,
            updated_at: team.updated_at,
        }
    }
}

/// Online member ids of a team
#[derive(Debug, Serialize)]
pub struct PresenceResponse {
    pub team_id: String,
    pub online: Vec<String>,
}

impl PresenceResponse {
    pub fn new(team_id: i64, online: &[i64]) -> Self {
        Self {
            team_id: team_id.to_string(),
            online: ids(online),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ProjectMemberResponse {
    pub user_id: String,
    pub role: ProjectRole,
    pub added_at: DateTime<Utc>,
}

impl From<ProjectMember> for ProjectMemberResponse {
    fn from(member: ProjectMember) -> Self {
        Self {
            user_id: member.user_id.to_string(),
            role: member.role,
            added_at: member.added_at,
        }
    }
}

/// Project response
#[derive(Debug, Clone, Serialize)]
pub struct ProjectResponse {
    pub id: String,
    pub team_id: String,
    pub name: String,
    pub description: Option<String>,
    pub status: ProjectStatus,
    pub owner_id: String,
    pub start_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    pub members: Vec<ProjectMemberResponse>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Project> for ProjectResponse {
    fn from(project: Project) -> Self {
        Self {
            id: project.id.to_string(),
            team_id: project.team_id.to_string(),
            name: project.name,
            description: project.description,
            status: project.status,
            owner_id: project.owner_id.to_string(),
            start_date: project.start_date,
            due_date: project.due_date,
            members: project.members.into_iter().map(Into::into).collect(),
            created_at: project.created_at,
            updated_at: project.updated_at,
        }
    }
}

/// Project statistics response
#[derive(Debug, Serialize)]
pub struct ProjectStatsResponse {
    pub project_id: String,
    #[serde(flatten)]
    pub stats: ProjectStats,
}

/// Task response
#[derive(Debug, Clone, Serialize)]
pub struct TaskResponse {
    pub id: String,
    pub project_id: String,
    pub title: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub reporter_id: String,
    pub assignee_ids: Vec<String>,
    pub tags: Vec<String>,
    pub due_date: Option<DateTime<Utc>>,
    pub position: i32,
    pub estimated_hours: Option<f64>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Task> for TaskResponse {
    fn from(task: Task) -> Self {
        Self {
            id: task.id.to_string(),
            project_id: task.project_id.to_string(),
            title: task.title,
            description: task.description,
            status: task.status,
            priority: task.priority,
            reporter_id: task.reporter_id.to_string(),
            assignee_ids: ids(&task.assignee_ids),
            tags: task.tags,
            due_date: task.due_date,
            position: task.position,
            estimated_hours: task.estimated_hours,
            completed_at: task.completed_at,
            created_at: task.created_at,
            updated_at: task.updated_at,
        }
    }
}

/// Subtask response
#[derive(Debug, Clone, Serialize)]
pub struct SubtaskResponse {
    pub id: String,
    pub task_id: String,
    pub title: String,
    pub is_completed: bool,
    pub position: i32,
    pub created_by: String,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Subtask> for SubtaskResponse {
    fn from(subtask: Subtask) -> Self {
        Self {
            id: subtask.id.to_string(),
            task_id: subtask.task_id.to_string(),
            title: subtask.title,
            is_completed: subtask.is_completed,
            position: subtask.position,
            created_by: subtask.created_by.to_string(),
            completed_at: subtask.completed_at,
            created_at: subtask.created_at,
            updated_at: subtask.updated_at,
        }
    }
}

/// Comment response
#[derive(Debug, Clone, Serialize)]
pub struct CommentResponse {
    pub id: String,
    pub task_id: String,
    pub author_id: String,
    pub content: String,
    pub mentions: Vec<String>,
    pub edited_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<Comment> for CommentResponse {
    fn from(comment: Comment) -> Self {
        Self {
            id: comment.id.to_string(),
            task_id: comment.task_id.to_string(),
            author_id: comment.author_id.to_string(),
            content: comment.content,
            mentions: ids(&comment.mentions),
            edited_at: comment.edited_at,
            created_at: comment.created_at,
        }
    }
}

/// Attachment metadata response
#[derive(Debug, Clone, Serialize)]
pub struct AttachmentResponse {
    pub id: String,
    pub task_id: String,
    pub uploaded_by: String,
    pub filename: String,
    pub content_type: String,
    pub size: i64,
    pub checksum: String,
    pub url: String,
    pub created_at: DateTime<Utc>,
}

impl From<Attachment> for AttachmentResponse {
    fn from(attachment: Attachment) -> Self {
        Self {
            url: format!("/api/attachments/{}", attachment.id),
            id: attachment.id.to_string(),
            task_id: attachment.task_id.to_string(),
            uploaded_by: attachment.uploaded_by.to_string(),
            filename: attachment.filename,
            content_type: attachment.content_type,
            size: attachment.size,
            checksum: attachment.checksum,
            created_at: attachment.created_at,
        }
    }
}

/// Notification response
#[derive(Debug, Clone, Serialize)]
pub struct NotificationResponse {
    pub id: String,
    pub kind: NotificationKind,
    pub actor_id: Option<String>,
    pub title: String,
    pub body: Option<String>,
    pub entity_type: EntityType,
    pub entity_id: String,
    pub read: bool,
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<Notification> for NotificationResponse {
    fn from(n: Notification) -> Self {
        Self {
            id: n.id.to_string(),
            kind: n.kind,
            actor_id: n.actor_id.map(|a| a.to_string()),
            title: n.title,
            body: n.body,
            entity_type: n.entity_type,
            entity_id: n.entity_id.to_string(),
            read: n.read_at.is_some(),
            read_at: n.read_at,
            created_at: n.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct UnreadCountResponse {
    pub unread: i64,
}

#[derive(Debug, Serialize)]
pub struct MarkedResponse {
    pub updated: u64,
}

/// Activity log entry response
#[derive(Debug, Clone, Serialize)]
pub struct ActivityResponse {
    pub id: String,
    pub actor_id: String,
    pub project_id: Option<String>,
    pub task_id: Option<String>,
    pub entity_type: EntityType,
    pub entity_id: String,
    pub action: ActivityAction,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl From<Activity> for ActivityResponse {
    fn from(a: Activity) -> Self {
        Self {
            id: a.id.to_string(),
            actor_id: a.actor_id.to_string(),
            project_id: a.project_id.map(|p| p.to_string()),
            task_id: a.task_id.map(|t| t.to_string()),
            entity_type: a.entity_type,
            entity_id: a.entity_id.to_string(),
            action: a.action,
            metadata: a.metadata,
            created_at: a.created_at,
        }
    }
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checks: Option<serde_json::Value>,
}
