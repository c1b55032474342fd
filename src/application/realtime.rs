//! Real-time event contract between services and the socket layer.
//!
//! Services describe *what* happened and *which rooms* care; the WebSocket
//! gateway implements [`EventBroadcaster`] and handles fan-out.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::application::dto::response::{
    AttachmentResponse, CommentResponse, NotificationResponse, ProjectResponse, SubtaskResponse,
    TaskResponse, TeamMemberResponse, TeamResponse,
};

/// A broadcast audience.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Room {
    User(i64),
    Team(i64),
    Project(i64),
    Task(i64),
}

impl fmt::Display for Room {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Room::User(id) => write!(f, "user:{}", id),
            Room::Team(id) => write!(f, "team:{}", id),
            Room::Project(id) => write!(f, "project:{}", id),
            Room::Task(id) => write!(f, "task:{}", id),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid room: {0}")]
pub struct InvalidRoom(pub String);

impl FromStr for Room {
    type Err = InvalidRoom;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind, id) = s.split_once(':').ok_or_else(|| InvalidRoom(s.to_string()))?;
        let id: i64 = id.parse().map_err(|_| InvalidRoom(s.to_string()))?;
        match kind {
            "user" => Ok(Room::User(id)),
            "team" => Ok(Room::Team(id)),
            "project" => Ok(Room::Project(id)),
            "task" => Ok(Room::Task(id)),
            _ => Err(InvalidRoom(s.to_string())),
        }
    }
}

/// Reference to a removed record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeletedRef {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
}

impl DeletedRef {
    pub fn new(id: i64, parent_id: Option<i64>) -> Self {
        Self {
            id: id.to_string(),
            parent_id: parent_id.map(|p| p.to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TeamMemberEvent {
    pub team_id: String,
    #[serde(flatten)]
    pub member: TeamMemberResponse,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TeamMemberRemovedEvent {
    pub team_id: String,
    pub user_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PresenceEvent {
    pub user_id: String,
    pub status: PresenceStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PresenceStatus {
    Online,
    Offline,
}

/// Events dispatched to sockets. Serialized as `{"t": NAME, "d": payload}`.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "t", content = "d", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RealtimeEvent {
    TaskCreated(TaskResponse),
    TaskUpdated(TaskResponse),
    TaskDeleted(DeletedRef),
    TaskRestored(TaskResponse),
    SubtaskCreated(SubtaskResponse),
    SubtaskUpdated(SubtaskResponse),
    SubtaskDeleted(DeletedRef),
    CommentCreated(CommentResponse),
    CommentUpdated(CommentResponse),
    CommentDeleted(DeletedRef),
    AttachmentAdded(AttachmentResponse),
    AttachmentDeleted(DeletedRef),
    ProjectUpdated(ProjectResponse),
    ProjectDeleted(DeletedRef),
    TeamUpdated(TeamResponse),
    TeamMemberAdded(TeamMemberEvent),
    TeamMemberRemoved(TeamMemberRemovedEvent),
    NotificationCreated(NotificationResponse),
    PresenceUpdate(PresenceEvent),
}

impl RealtimeEvent {
    /// Dispatch name (`t` field).
    pub fn name(&self) -> &'static str {
        match self {
            Self::TaskCreated(_) => "TASK_CREATED",
            Self::TaskUpdated(_) => "TASK_UPDATED",
            Self::TaskDeleted(_) => "TASK_DELETED",
            Self::TaskRestored(_) => "TASK_RESTORED",
            Self::SubtaskCreated(_) => "SUBTASK_CREATED",
            Self::SubtaskUpdated(_) => "SUBTASK_UPDATED",
            Self::SubtaskDeleted(_) => "SUBTASK_DELETED",
            Self::CommentCreated(_) => "COMMENT_CREATED",
            Self::CommentUpdated(_) => "COMMENT_UPDATED",
            Self::CommentDeleted(_) => "COMMENT_DELETED",
            Self::AttachmentAdded(_) => "ATTACHMENT_ADDED",
            Self::AttachmentDeleted(_) => "ATTACHMENT_DELETED",
            Self::ProjectUpdated(_) => "PROJECT_UPDATED",
            Self::ProjectDeleted(_) => "PROJECT_DELETED",
            Self::TeamUpdated(_) => "TEAM_UPDATED",
            Self::TeamMemberAdded(_) => "TEAM_MEMBER_ADDED",
            Self::TeamMemberRemoved(_) => "TEAM_MEMBER_REMOVED",
            Self::NotificationCreated(_) => "NOTIFICATION_CREATED",
            Self::PresenceUpdate(_) => "PRESENCE_UPDATE",
        }
    }

    /// Payload (`d` field).
    pub fn payload(&self) -> serde_json::Value {
        serde_json::to_value(self)
            .ok()
            .and_then(|mut v| v.get_mut("d").map(serde_json::Value::take))
            .unwrap_or(serde_json::Value::Null)
    }
}

/// Fan-out seam implemented by the socket gateway.
#[cfg_attr(test, mockall::automock)]
pub trait EventBroadcaster: Send + Sync {
    /// Deliver `event` to every session in any of `rooms`, once per session.
    fn publish(&self, rooms: &[Room], event: RealtimeEvent);

    /// User ids with at least one live session among `user_ids`.
    fn online_users(&self, user_ids: &[i64]) -> Vec<i64>;

    /// Take `user_id`'s sessions out of `rooms` and out of every room they
    /// joined through one of them.
    fn revoke(&self, user_id: i64, rooms: &[Room]);

    /// Take every session out of `rooms` and the rooms joined through them.
    fn close_rooms(&self, rooms: &[Room]);

    /// End all live sessions of `user_id`.
    fn disconnect_user(&self, user_id: i64);
}
