//! Notification entity and repository trait.
//!
//! Maps to the `notifications` table in the database schema.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::activity::EntityType;
use crate::shared::error::AppError;
use crate::shared::pagination::{Page, PageRequest};

/// What the notification is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    TaskAssigned,
    TaskStatusChanged,
    CommentAdded,
    Mentioned,
    TaskDueSoon,
    TeamMemberAdded,
}

impl NotificationKind {
    /// Convert from database string representation.
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "task_assigned" => Some(Self::TaskAssigned),
            "task_status_changed" => Some(Self::TaskStatusChanged),
            "comment_added" => Some(Self::CommentAdded),
            "mentioned" => Some(Self::Mentioned),
            "task_due_soon" => Some(Self::TaskDueSoon),
            "team_member_added" => Some(Self::TeamMemberAdded),
            _ => None,
        }
    }

    /// Convert to database string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TaskAssigned => "task_assigned",
            Self::TaskStatusChanged => "task_status_changed",
            Self::CommentAdded => "comment_added",
            Self::Mentioned => "mentioned",
            Self::TaskDueSoon => "task_due_soon",
            Self::TeamMemberAdded => "team_member_added",
        }
    }
}

impl std::fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A message for one recipient.
///
/// Maps to the `notifications` table:
/// - id: BIGINT PRIMARY KEY (Snowflake ID, assigned before enqueueing)
/// - user_id: BIGINT NOT NULL REFERENCES users(id)
/// - actor_id: BIGINT NULL (None for system notifications)
/// - kind: VARCHAR(32) NOT NULL
/// - title: VARCHAR(200) NOT NULL
/// - body: TEXT NULL
/// - entity_type: VARCHAR(16) NOT NULL
/// - entity_id: BIGINT NOT NULL
/// - read_at: TIMESTAMPTZ NULL
/// - created_at: TIMESTAMPTZ NOT NULL
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: i64,
    pub user_id: i64,
    pub actor_id: Option<i64>,
    pub kind: NotificationKind,
    pub title: String,
    pub body: Option<String>,
    pub entity_type: EntityType,
    pub entity_id: i64,
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn is_read(&self) -> bool {
        self.read_at.is_some()
    }
}

/// Repository trait for Notification data access operations.
#[async_trait]
pub trait NotificationRepository: Send + Sync {
    /// Insert unless a notification with the same id exists.
    /// Returns `true` when a row was inserted.
    async fn insert_if_absent(&self, notification: &Notification) -> Result<bool, AppError>;

    async fn find_by_id(&self, id: i64) -> Result<Option<Notification>, AppError>;

    /// Notifications of a user, newest first.
    async fn list_for_user(
        &self,
        user_id: i64,
        unread_only: bool,
        page: PageRequest,
    ) -> Result<Page<Notification>, AppError>;

    async fn unread_count(&self, user_id: i64) -> Result<i64, AppError>;

    /// Mark read if unread; keeps the first read time.
    async fn mark_read(&self, id: i64, at: DateTime<Utc>) -> Result<(), AppError>;

    /// Returns the number of notifications marked.
    async fn mark_all_read(&self, user_id: i64, at: DateTime<Utc>) -> Result<u64, AppError>;

    async fn delete(&self, id: i64) -> Result<(), AppError>;

    /// Delete notifications read before `before`.
    async fn purge_read(&self, before: DateTime<Utc>) -> Result<u64, AppError>;
}
