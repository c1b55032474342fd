//! # Domain Entities
//!
//! Core domain entities representing the business objects of the task server.
//! All entities map directly to their corresponding database tables.
//!
//! ## Core Entities
//!
//! - **User**: User account with authentication data and profile
//! - **Team**: A group of users that owns projects
//! - **Project**: A board of tasks inside a team
//! - **Task**: A unit of work with status, priority and assignees
//!
//! ## Supporting Entities
//!
//! - **Subtask**: Checklist items of a task
//! - **Comment**: Discussion on a task, with mentions
//! - **Attachment**: Files uploaded to a task
//! - **Notification**: Per-recipient messages delivered by the job queue
//! - **Activity**: Append-only audit log
//! - **Session**: Refresh token sessions
//!
//! ## Repository Traits
//!
//! Each entity has an associated repository trait defining data access operations.
//! These traits are implemented in the infrastructure layer, following the
//! dependency inversion principle.

mod activity;
mod attachment;
mod comment;
mod notification;
mod project;
mod session;
mod subtask;
mod task;
mod team;
mod user;

pub use activity::{Activity, ActivityAction, ActivityRepository, EntityType};
pub use attachment::{sanitize_filename, Attachment, AttachmentRepository};
pub use comment::{Comment, CommentRepository, MAX_COMMENT_LENGTH};
pub use notification::{Notification, NotificationKind, NotificationRepository};
pub use project::{
    Project, ProjectMember, ProjectRepository, ProjectRole, ProjectStats, ProjectStatus,
};
pub use session::{Session, SessionRepository};
pub use subtask::{Subtask, SubtaskRepository};
pub use task::{Task, TaskPriority, TaskRepository, TaskStatus};
pub use team::{Team, TeamMember, TeamRepository, TeamRole};
pub use user::{User, UserRepository};
