//! Application Services
//!
//! Business logic services that coordinate domain operations.
//!
//! ## Available Services
//!
//! - **AuthService**: Registration, JWT tokens, refresh sessions, passwords
//! - **UserService**: Profile management, search and deactivation
//! - **TeamService**: Teams and team membership
//! - **ProjectService**: Projects, project members and statistics
//! - **TaskService**: Tasks with assignment and status notifications
//! - **SubtaskService** / **CommentService** / **AttachmentService**: Task content
//! - **NotificationService**: Job-queued notification delivery and inbox
//! - **ActivityService**: Project and task activity feeds
//! - **MaintenanceService**: Work behind the scheduled jobs
//!
//! Every service checks access through [`access`] before touching data and
//! treats activity, events and notifications as best-effort side effects.

pub mod access;
pub mod activity_service;
pub mod attachment_service;
pub mod auth_service;
pub mod comment_service;
pub mod maintenance_service;
pub mod notification_service;
pub mod project_service;
pub mod subtask_service;
pub mod task_service;
pub mod team_service;
pub mod user_service;

pub use access::{AccessError, ProjectScope, TaskScope};

// Re-export auth service types
pub use auth_service::{
    decode_access_token, AuthError, AuthService, AuthServiceImpl, AuthTokens, Claims, RegisterInput,
};

pub use user_service::{UserError, UserService, UserServiceImpl};

pub use team_service::{TeamError, TeamService, TeamServiceImpl};

pub use project_service::{ProjectError, ProjectQuery, ProjectService, ProjectServiceImpl};

pub use task_service::{TaskError, TaskService, TaskServiceImpl};

pub use subtask_service::{SubtaskService, SubtaskServiceImpl};

pub use comment_service::{CommentError, CommentService, CommentServiceImpl};

pub use attachment_service::{
    AttachmentError, AttachmentService, AttachmentServiceImpl, UploadedFile,
};

pub use notification_service::{NotificationDraft, NotificationService, NotificationServiceImpl};

pub use activity_service::{ActivityRecorder, ActivityService, ActivityServiceImpl, NewActivity};

pub use maintenance_service::{CleanupReport, MaintenanceService, MaintenanceServiceImpl};
