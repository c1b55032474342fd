//! Repository bundle handed to application services.

use std::sync::Arc;

use super::entities::{
    ActivityRepository, AttachmentRepository, CommentRepository, NotificationRepository,
    ProjectRepository, SessionRepository, SubtaskRepository, TaskRepository, TeamRepository,
    UserRepository,
};

/// One handle per repository trait, shared by every service.
///
/// The infrastructure layer fills it with either the Postgres or the in-memory
/// implementations.
#[derive(Clone)]
pub struct Repositories {
    pub users: Arc<dyn UserRepository>,
    pub sessions: Arc<dyn SessionRepository>,
    pub teams: Arc<dyn TeamRepository>,
    pub projects: Arc<dyn ProjectRepository>,
    pub tasks: Arc<dyn TaskRepository>,
    pub subtasks: Arc<dyn SubtaskRepository>,
    pub comments: Arc<dyn CommentRepository>,
    pub attachments: Arc<dyn AttachmentRepository>,
    pub notifications: Arc<dyn NotificationRepository>,
    pub activities: Arc<dyn ActivityRepository>,
}
