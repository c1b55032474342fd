//! Task Service
//!
//! Task CRUD with the side effects every write carries: an activity entry,
//! a real-time event to the project and task rooms, and notifications for
//! assignment and status changes.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;

use super::access::{self, AccessError, TaskScope};
use super::activity_service::{ActivityRecorder, NewActivity};
use super::notification_service::{NotificationDraft, NotificationService};
use crate::application::dto::request::{CreateTaskRequest, UpdateTaskRequest};
use crate::application::realtime::{DeletedRef, EventBroadcaster, RealtimeEvent};
use crate::domain::services::AccessLevel;
use crate::domain::value_objects::{TaskFilter, TaskSort};
use crate::domain::{
    ActivityAction, EntityType, NotificationKind, Repositories, Task, TaskStatus,
};
use crate::shared::error::AppError;
use crate::shared::pagination::{Page, PageRequest};
use crate::shared::snowflake::SnowflakeGenerator;
use crate::shared::validation::{parse_ids, required_text};

const MAX_TAG_LENGTH: usize = 32;
const MAX_ESTIMATED_HOURS: f64 = 10000.0;

/// Task service trait
#[async_trait]
pub trait TaskService: Send + Sync {
    async fn create(&self, user_id: i64, project_id: i64, request: CreateTaskRequest) -> Result<Task, TaskError>;

    /// Tasks of `filter.project_id`
    async fn list(
        &self,
        user_id: i64,
        filter: TaskFilter,
        sort: TaskSort,
        page: PageRequest,
    ) -> Result<Page<Task>, TaskError>;

    async fn get(&self, user_id: i64, task_id: i64) -> Result<Task, TaskError>;

    async fn update(&self, user_id: i64, task_id: i64, request: UpdateTaskRequest) -> Result<Task, TaskError>;

    async fn delete(&self, user_id: i64, task_id: i64) -> Result<(), TaskError>;

    /// Undo a soft delete (managers only)
    async fn restore(&self, user_id: i64, task_id: i64) -> Result<Task, TaskError>;
}

/// Task service errors
#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    #[error(transparent)]
    Access(#[from] AccessError),

    #[error("Assignees must have access to the project")]
    InvalidAssignees,

    #[error("Tags must be 1-32 characters")]
    InvalidTag,

    #[error("Estimated hours must be 0-10000")]
    InvalidEstimate,

    #[error("Only the reporter or a project manager can delete this task")]
    CannotDelete,

    #[error(transparent)]
    Repository(#[from] AppError),
}

impl From<TaskError> for AppError {
    fn from(e: TaskError) -> Self {
        match e {
            TaskError::Access(e) => e.into(),
            TaskError::InvalidAssignees => AppError::invalid_field("assignee_ids", e.to_string()),
            TaskError::InvalidTag => AppError::invalid_field("tags", e.to_string()),
            TaskError::InvalidEstimate => AppError::invalid_field("estimated_hours", e.to_string()),
            TaskError::CannotDelete => AppError::Forbidden(e.to_string()),
            TaskError::Repository(e) => e,
        }
    }
}

/// Trim, lowercase and de-duplicate tags, keeping first-seen order.
pub fn normalize_tags(raw: &[String]) -> Result<Vec<String>, TaskError> {
    let mut seen = HashSet::new();
    let mut tags = Vec::with_capacity(raw.len());
    for tag in raw {
        let tag = tag.trim().to_lowercase();
        if tag.is_empty() || tag.chars().count() > MAX_TAG_LENGTH {
            return Err(TaskError::InvalidTag);
        }
        if seen.insert(tag.clone()) {
            tags.push(tag);
        }
    }
    Ok(tags)
}

fn check_estimate(hours: Option<f64>) -> Result<Option<f64>, TaskError> {
    match hours {
        Some(h) if !(0.0..=MAX_ESTIMATED_HOURS).contains(&h) => Err(TaskError::InvalidEstimate),
        _ => Ok(hours),
    }
}

fn normalize_description(description: Option<String>) -> Option<String> {
    description.map(|d| d.trim().to_string()).filter(|d| !d.is_empty())
}

/// TaskService implementation
pub struct TaskServiceImpl {
    repos: Repositories,
    id_generator: Arc<SnowflakeGenerator>,
    events: Arc<dyn EventBroadcaster>,
    notifications: Arc<dyn NotificationService>,
    activity: ActivityRecorder,
}

impl TaskServiceImpl {
    pub fn new(
        repos: Repositories,
        id_generator: Arc<SnowflakeGenerator>,
        events: Arc<dyn EventBroadcaster>,
        notifications: Arc<dyn NotificationService>,
        activity: ActivityRecorder,
    ) -> Self {
        Self {
            repos,
            id_generator,
            events,
            notifications,
            activity,
        }
    }

    /// Parse assignee ids and check each one can view the project.
    fn resolve_assignees(scope: &access::ProjectScope, raw: &[String]) -> Result<Vec<i64>, TaskError> {
        let ids = parse_ids(raw, "assignee")?;
        if access::viewers_among(scope, &ids).len() != ids.len() {
            return Err(TaskError::InvalidAssignees);
        }
        Ok(ids)
    }

    /// Notify the recipients that can still view the project.
    async fn notify(&self, scope: &access::ProjectScope, recipients: &[i64], draft: NotificationDraft) {
        let recipients = access::viewers_among(scope, recipients);
        if recipients.is_empty() {
            return;
        }
        let entity_id = draft.entity_id;
        if let Err(e) = self.notifications.notify(&recipients, draft).await {
            tracing::warn!(task_id = entity_id, error = %e, "Failed to enqueue task notification");
        }
    }

    async fn notify_assigned(&self, scope: &TaskScope, actor_id: i64, task: &Task, assignees: &[i64]) {
        let draft = NotificationDraft {
            kind: NotificationKind::TaskAssigned,
            actor_id: Some(actor_id),
            title: format!("You were assigned to \"{}\"", task.title),
            body: None,
            entity_type: EntityType::Task,
            entity_id: task.id,
        };
        self.notify(&scope.scope, assignees, draft).await;
    }

    fn publish(&self, scope: &TaskScope, event: RealtimeEvent) {
        self.events.publish(&scope.rooms(), event);
    }
}

#[async_trait]
impl TaskService for TaskServiceImpl {
    async fn create(&self, user_id: i64, project_id: i64, request: CreateTaskRequest) -> Result<Task, TaskError> {
        let scope = access::project_scope(&self.repos, project_id, user_id, AccessLevel::Contributor).await?;
        let assignees = Self::resolve_assignees(&scope, &request.assignee_ids)?;
        let tags = normalize_tags(&request.tags)?;

        let now = Utc::now();
        let mut task = Task::new(
            self.id_generator.generate(),
            project_id,
            required_text(&request.title, "title")?,
            user_id,
        );
        task.description = normalize_description(request.description);
        task.set_status(request.status.unwrap_or_default(), now);
        task.priority = request.priority.unwrap_or_default();
        task.assignee_ids = assignees;
        task.tags = tags;
        task.set_due_date(request.due_date);
        task.estimated_hours = check_estimate(request.estimated_hours)?;
        task.position = match request.position {
            Some(position) => position,
            None => self
                .repos
                .tasks
                .max_position(project_id)
                .await?
                .map(|p| p.saturating_add(1))
                .unwrap_or(0),
        };

        let task = self.repos.tasks.create(&task).await?;
        let task_scope = TaskScope {
            scope,
            task: task.clone(),
        };

        self.activity
            .record(
                NewActivity::new(user_id, EntityType::Task, task.id, ActivityAction::Created)
                    .in_task(&task_scope)
                    .with_metadata(json!({ "title": task.title })),
            )
            .await;
        self.publish(&task_scope, RealtimeEvent::TaskCreated(task.clone().into()));
        self.notify_assigned(&task_scope, user_id, &task, &task.assignee_ids).await;

        tracing::debug!(task_id = task.id, project_id, user_id, "Task created");
        Ok(task)
    }

    async fn list(
        &self,
        user_id: i64,
        mut filter: TaskFilter,
        sort: TaskSort,
        page: PageRequest,
    ) -> Result<Page<Task>, TaskError> {
        access::project_scope(&self.repos, filter.project_id, user_id, AccessLevel::Viewer).await?;
        filter.tag = filter.tag.map(|t| t.trim().to_lowercase()).filter(|t| !t.is_empty());
        filter.q = filter.q.map(|q| q.trim().to_string()).filter(|q| !q.is_empty());
        Ok(self.repos.tasks.list(&filter, sort, page).await?)
    }

    async fn get(&self, user_id: i64, task_id: i64) -> Result<Task, TaskError> {
        let scope = access::task_scope(&self.repos, task_id, user_id, AccessLevel::Viewer).await?;
        Ok(scope.task)
    }

    async fn update(&self, user_id: i64, task_id: i64, request: UpdateTaskRequest) -> Result<Task, TaskError> {
        let scope = access::task_scope(&self.repos, task_id, user_id, AccessLevel::Contributor).await?;
        let before = scope.task.clone();
        let mut task = before.clone();
        let now = Utc::now();

        if let Some(title) = request.title {
            task.title = required_text(&title, "title")?;
        }
        if let Some(description) = request.description {
            task.description = normalize_description(description);
        }
        if let Some(status) = request.status {
            task.set_status(status, now);
        }
        if let Some(priority) = request.priority {
            task.priority = priority;
        }
        if let Some(assignee_ids) = request.assignee_ids {
            task.assignee_ids = Self::resolve_assignees(&scope.scope, &assignee_ids)?;
        }
        if let Some(tags) = request.tags {
            task.tags = normalize_tags(&tags)?;
        }
        if let Some(due_date) = request.due_date {
            task.set_due_date(due_date);
        }
        if let Some(position) = request.position {
            task.position = position;
        }
        if let Some(estimated_hours) = request.estimated_hours {
            task.estimated_hours = check_estimate(estimated_hours)?;
        }

        task.updated_at = now;
        let task = self.repos.tasks.update(&task).await?;
        let task_scope = TaskScope {
            scope: scope.scope,
            task: task.clone(),
        };

        let added: Vec<i64> = task
            .assignee_ids
            .iter()
            .copied()
            .filter(|id| !before.is_assigned_to(*id))
            .collect();
        let removed: Vec<i64> = before
            .assignee_ids
            .iter()
            .copied()
            .filter(|id| !task.is_assigned_to(*id))
            .collect();
        let status_changed = task.status != before.status;

        if status_changed {
            let action = if task.status == TaskStatus::Done {
                ActivityAction::Completed
            } else {
                ActivityAction::StatusChanged
            };
            self.activity
                .record(
                    NewActivity::new(user_id, EntityType::Task, task.id, action)
                        .in_task(&task_scope)
                        .with_metadata(json!({ "from": before.status, "to": task.status })),
                )
                .await;
        }
        if !added.is_empty() || !removed.is_empty() {
            let added_ids: Vec<String> = added.iter().map(|id| id.to_string()).collect();
            let removed_ids: Vec<String> = removed.iter().map(|id| id.to_string()).collect();
            self.activity
                .record(
                    NewActivity::new(user_id, EntityType::Task, task.id, ActivityAction::Assigned)
                        .in_task(&task_scope)
                        .with_metadata(json!({ "added": added_ids, "removed": removed_ids })),
                )
                .await;
        }
        if !status_changed && added.is_empty() && removed.is_empty() {
            self.activity
                .record(
                    NewActivity::new(user_id, EntityType::Task, task.id, ActivityAction::Updated)
                        .in_task(&task_scope),
                )
                .await;
        }

        self.publish(&task_scope, RealtimeEvent::TaskUpdated(task.clone().into()));

        self.notify_assigned(&task_scope, user_id, &task, &added).await;
        if status_changed {
            let draft = NotificationDraft {
                kind: NotificationKind::TaskStatusChanged,
                actor_id: Some(user_id),
                title: format!("\"{}\" moved to {}", task.title, task.status),
                body: Some(format!("Status changed from {} to {}", before.status, task.status)),
                entity_type: EntityType::Task,
                entity_id: task.id,
            };
            // Users who were just assigned already got a notification
            let watchers: Vec<i64> = task
                .watchers()
                .into_iter()
                .filter(|id| !added.contains(id))
                .collect();
            self.notify(&task_scope.scope, &watchers, draft).await;
        }

        Ok(task)
    }

    async fn delete(&self, user_id: i64, task_id: i64) -> Result<(), TaskError> {
        let scope = access::task_scope(&self.repos, task_id, user_id, AccessLevel::Contributor).await?;
        if scope.scope.level < AccessLevel::Manager && scope.task.reporter_id != user_id {
            return Err(TaskError::CannotDelete);
        }

        self.repos.tasks.soft_delete(task_id, Utc::now()).await?;

        self.activity
            .record(
                NewActivity::new(user_id, EntityType::Task, task_id, ActivityAction::Deleted)
                    .in_task(&scope),
            )
            .await;
        self.publish(
            &scope,
            RealtimeEvent::TaskDeleted(DeletedRef::new(task_id, Some(scope.task.project_id))),
        );

        tracing::debug!(task_id, user_id, "Task deleted");
        Ok(())
    }

    async fn restore(&self, user_id: i64, task_id: i64) -> Result<Task, TaskError> {
        let task = self
            .repos
            .tasks
            .find_by_id_with_deleted(task_id)
            .await?
            .ok_or(AccessError::NotFound("Task"))?;
        let scope = access::scope_for_task(&self.repos, task, user_id, AccessLevel::Manager).await?;

        if !scope.task.is_deleted() {
            return Ok(scope.task);
        }

        self.repos.tasks.restore(task_id).await?;
        let mut task = scope.task.clone();
        task.deleted_at = None;
        let task_scope = TaskScope {
            scope: scope.scope,
            task: task.clone(),
        };

        self.activity
            .record(
                NewActivity::new(user_id, EntityType::Task, task_id, ActivityAction::Restored)
                    .in_task(&task_scope),
            )
            .await;
        self.publish(&task_scope, RealtimeEvent::TaskRestored(task.clone().into()));

        Ok(task)
    }
}
