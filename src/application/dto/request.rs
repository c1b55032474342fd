//! Request DTOs
//!
//! Data structures for API request bodies and query strings.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer};
use validator::Validate;

use crate::domain::value_objects::{SortOrder, TaskSortField};
use crate::domain::{ProjectRole, ProjectStatus, TaskPriority, TaskStatus, TeamRole};

/// Distinguish an absent field (`None`) from an explicit `null` (`Some(None)`).
///
/// Use with `#[serde(default, deserialize_with = "double_option")]`.
pub fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

// =============================================================================
// Auth
// =============================================================================

/// Registration request
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 2, max = 32, message = "Username must be 2-32 characters"))]
    pub username: String,

    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(length(min = 8, max = 128, message = "Password must be 8-128 characters"))]
    pub password: String,

    #[validate(length(min = 1, max = 64, message = "Display name must be 1-64 characters"))]
    pub display_name: Option<String>,
}

/// Login request
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

/// Refresh token request (also used by logout)
#[derive(Debug, Deserialize, Validate)]
pub struct RefreshTokenRequest {
    #[validate(length(min = 1, message = "Refresh token is required"))]
    pub refresh_token: String,
}

/// Change password request
#[derive(Debug, Deserialize, Validate)]
pub struct ChangePasswordRequest {
    #[validate(length(min = 1, message = "Current password is required"))]
    pub current_password: String,

    #[validate(length(min = 8, max = 128, message = "Password must be 8-128 characters"))]
    pub new_password: String,
}

// =============================================================================
// Users
// =============================================================================

/// Update own profile request. `null` clears a field.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateProfileRequest {
    #[serde(default, deserialize_with = "double_option")]
    pub display_name: Option<Option<String>>,

    #[serde(default, deserialize_with = "double_option")]
    pub avatar_url: Option<Option<String>>,

    #[serde(default, deserialize_with = "double_option")]
    pub bio: Option<Option<String>>,
}

/// User search query
#[derive(Debug, Deserialize)]
pub struct UserSearchQuery {
    pub q: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

/// Plain pagination query
#[derive(Debug, Default, Deserialize)]
pub struct PaginationQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

// =============================================================================
// Teams
// =============================================================================

/// Create team request
#[derive(Debug, Deserialize, Validate)]
pub struct CreateTeamRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: String,

    #[validate(length(max = 2000, message = "Description must be at most 2000 characters"))]
    pub description: Option<String>,
}

/// Update team request
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateTeamRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: Option<String>,

    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
}

/// Add team member request
#[derive(Debug, Deserialize, Validate)]
pub struct AddTeamMemberRequest {
    #[validate(length(min = 1, message = "User ID is required"))]
    pub user_id: String,

    pub role: Option<TeamRole>,
}

/// Change team member role request
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateTeamMemberRequest {
    pub role: TeamRole,
}

// =============================================================================
// Projects
// =============================================================================

/// Create project request
#[derive(Debug, Deserialize, Validate)]
pub struct CreateProjectRequest {
    #[validate(length(min = 1, message = "Team ID is required"))]
    pub team_id: String,

    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: String,

    #[validate(length(max = 5000, message = "Description must be at most 5000 characters"))]
    pub description: Option<String>,

    pub status: Option<ProjectStatus>,
    pub start_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
}

/// Update project request
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProjectRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: Option<String>,

    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,

    pub status: Option<ProjectStatus>,

    #[serde(default, deserialize_with = "double_option")]
    pub start_date: Option<Option<NaiveDate>>,

    #[serde(default, deserialize_with = "double_option")]
    pub due_date: Option<Option<NaiveDate>>,
}

/// Project listing query
#[derive(Debug, Deserialize)]
pub struct ProjectListQuery {
    pub team_id: Option<String>,
    pub status: Option<ProjectStatus>,
    pub q: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

/// Add project member request
#[derive(Debug, Deserialize, Validate)]
pub struct AddProjectMemberRequest {
    #[validate(length(min = 1, message = "User ID is required"))]
    pub user_id: String,

    pub role: Option<ProjectRole>,
}

/// Change project member role request
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProjectMemberRequest {
    pub role: ProjectRole,
}

// =============================================================================
// Tasks
// =============================================================================

/// Create task request
#[derive(Debug, Deserialize, Validate)]
pub struct CreateTaskRequest {
    #[validate(length(min = 1, max = 200, message = "Title must be 1-200 characters"))]
    pub title: String,

    #[validate(length(max = 10000, message = "Description must be at most 10000 characters"))]
    pub description: Option<String>,

    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,

    #[serde(default)]
    #[validate(length(max = 20, message = "At most 20 assignees"))]
    pub assignee_ids: Vec<String>,

    #[serde(default)]
    #[validate(length(max = 20, message = "At most 20 tags"))]
    pub tags: Vec<String>,

    pub due_date: Option<DateTime<Utc>>,

    #[validate(range(min = 0, max = 1_000_000, message = "Position must be 0-1000000"))]
    pub position: Option<i32>,

    #[validate(range(min = 0.0, max = 10000.0, message = "Estimated hours must be 0-10000"))]
    pub estimated_hours: Option<f64>,
}

/// Partial task update. Omitted fields are unchanged; `null` clears nullable ones.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateTaskRequest {
    #[validate(length(min = 1, max = 200, message = "Title must be 1-200 characters"))]
    pub title: Option<String>,

    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,

    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,

    #[validate(length(max = 20, message = "At most 20 assignees"))]
    pub assignee_ids: Option<Vec<String>>,

    #[validate(length(max = 20, message = "At most 20 tags"))]
    pub tags: Option<Vec<String>>,

    #[serde(default, deserialize_with = "double_option")]
    pub due_date: Option<Option<DateTime<Utc>>>,

    #[validate(range(min = 0, max = 1_000_000, message = "Position must be 0-1000000"))]
    pub position: Option<i32>,

    #[serde(default, deserialize_with = "double_option")]
    pub estimated_hours: Option<Option<f64>>,
}

/// Task listing query
#[derive(Debug, Default, Deserialize)]
pub struct TaskListQuery {
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    pub assignee_id: Option<String>,
    pub tag: Option<String>,
    pub due_before: Option<DateTime<Utc>>,
    pub due_after: Option<DateTime<Utc>>,
    pub q: Option<String>,
    pub sort: Option<TaskSortField>,
    pub order: Option<SortOrder>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

// =============================================================================
// Subtasks and Comments
// =============================================================================

/// Create subtask request
#[derive(Debug, Deserialize, Validate)]
pub struct CreateSubtaskRequest {
    #[validate(length(min = 1, max = 200, message = "Title must be 1-200 characters"))]
    pub title: String,

    #[validate(range(min = 0, max = 1_000_000, message = "Position must be 0-1000000"))]
    pub position: Option<i32>,
}

/// Update subtask request
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateSubtaskRequest {
    #[validate(length(min = 1, max = 200, message = "Title must be 1-200 characters"))]
    pub title: Option<String>,

    pub is_completed: Option<bool>,

    #[validate(range(min = 0, max = 1_000_000, message = "Position must be 0-1000000"))]
    pub position: Option<i32>,
}

/// Create comment request
#[derive(Debug, Deserialize, Validate)]
pub struct CreateCommentRequest {
    #[validate(length(min = 1, max = 5000, message = "Content must be 1-5000 characters"))]
    pub content: String,

    #[serde(default)]
    #[validate(length(max = 50, message = "At most 50 mentions"))]
    pub mentions: Vec<String>,
}

/// Edit comment request
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateCommentRequest {
    #[validate(length(min = 1, max = 5000, message = "Content must be 1-5000 characters"))]
    pub content: String,
}

// =============================================================================
// Notifications
// =============================================================================

/// Notification listing query
#[derive(Debug, Default, Deserialize)]
pub struct NotificationListQuery {
    #[serde(default)]
    pub unread_only: bool,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}
