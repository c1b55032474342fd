//! In-memory repositories.
//!
//! Every repository shares one [`MemoryStore`] so cross-entity rules (team
//! visibility, cascading purges) behave like the Postgres schema. Locks are
//! always taken in table order: teams, projects, tasks, then task content.

mod notifications;
mod tasks;
mod teams;
mod users;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::RwLock;
use uuid::Uuid;

use crate::domain::{
    Activity, Attachment, Comment, Notification, Project, Repositories, Session, Subtask, Task,
    Team, User,
};

pub use notifications::{MemoryActivityRepository, MemoryNotificationRepository};
pub use tasks::{
    MemoryAttachmentRepository, MemoryCommentRepository, MemorySubtaskRepository,
    MemoryTaskRepository,
};
pub use teams::{MemoryProjectRepository, MemoryTeamRepository};
pub use users::{MemorySessionRepository, MemoryUserRepository};

/// Shared tables of the in-memory backend. Soft-deleted rows stay until purged.
#[derive(Default)]
pub struct MemoryStore {
    users: RwLock<HashMap<i64, User>>,
    sessions: RwLock<HashMap<Uuid, Session>>,
    teams: RwLock<HashMap<i64, Team>>,
    projects: RwLock<HashMap<i64, Project>>,
    tasks: RwLock<HashMap<i64, Task>>,
    subtasks: RwLock<HashMap<i64, Subtask>>,
    comments: RwLock<HashMap<i64, Comment>>,
    attachments: RwLock<HashMap<i64, Attachment>>,
    notifications: RwLock<HashMap<i64, Notification>>,
    activities: RwLock<Vec<Activity>>,
}

impl MemoryStore {
    /// Remove the content of purged tasks.
    fn cascade_tasks(&self, task_ids: &HashSet<i64>) {
        if task_ids.is_empty() {
            return;
        }
        self.subtasks.write().retain(|_, s| !task_ids.contains(&s.task_id));
        self.comments.write().retain(|_, c| !task_ids.contains(&c.task_id));
        self.attachments.write().retain(|_, a| !task_ids.contains(&a.task_id));
    }

    /// Remove the tasks of purged projects, and their content.
    fn cascade_projects(&self, project_ids: &HashSet<i64>) {
        if project_ids.is_empty() {
            return;
        }
        let removed: HashSet<i64> = {
            let mut tasks = self.tasks.write();
            let ids = tasks
                .values()
                .filter(|t| project_ids.contains(&t.project_id))
                .map(|t| t.id)
                .collect();
            tasks.retain(|_, t| !project_ids.contains(&t.project_id));
            ids
        };
        self.cascade_tasks(&removed);
    }
}

/// Whether the project and its team are both live.
fn project_is_live(teams: &HashMap<i64, Team>, project: &Project) -> bool {
    !project.is_deleted()
        && teams
            .get(&project.team_id)
            .map(|t| !t.is_deleted())
            .unwrap_or(false)
}

/// A fresh, empty in-memory repository bundle.
pub fn repositories() -> Repositories {
    repositories_with(Arc::new(MemoryStore::default()))
}

/// Repository bundle over an existing store.
pub fn repositories_with(store: Arc<MemoryStore>) -> Repositories {
    Repositories {
        users: Arc::new(MemoryUserRepository::new(store.clone())),
        sessions: Arc::new(MemorySessionRepository::new(store.clone())),
        teams: Arc::new(MemoryTeamRepository::new(store.clone())),
        projects: Arc::new(MemoryProjectRepository::new(store.clone())),
        tasks: Arc::new(MemoryTaskRepository::new(store.clone())),
        subtasks: Arc::new(MemorySubtaskRepository::new(store.clone())),
        comments: Arc::new(MemoryCommentRepository::new(store.clone())),
        attachments: Arc::new(MemoryAttachmentRepository::new(store.clone())),
        notifications: Arc::new(MemoryNotificationRepository::new(store.clone())),
        activities: Arc::new(MemoryActivityRepository::new(store)),
    }
}
