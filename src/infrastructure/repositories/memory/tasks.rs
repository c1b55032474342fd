//! In-memory tasks, subtasks, comments and attachments.

use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{project_is_live, MemoryStore};
use crate::domain::{
    Attachment, AttachmentRepository, Comment, CommentRepository, SortOrder, Subtask,
    SubtaskRepository, Task, TaskFilter, TaskRepository, TaskSort, TaskSortField, TaskStatus,
};
use crate::shared::error::AppError;
use crate::shared::pagination::{Page, PageRequest};

fn matches_filter(task: &Task, filter: &TaskFilter, q: Option<&str>) -> bool {
    task.project_id == filter.project_id
        && !task.is_deleted()
        && filter.status.map(|s| task.status == s).unwrap_or(true)
        && filter.priority.map(|p| task.priority == p).unwrap_or(true)
        && filter
            .assignee_id
            .map(|id| task.is_assigned_to(id))
            .unwrap_or(true)
        && filter
            .tag
            .as_ref()
            .map(|tag| task.tags.contains(tag))
            .unwrap_or(true)
        && filter
            .due_before
            .map(|before| task.due_date.map(|d| d <= before).unwrap_or(false))
            .unwrap_or(true)
        && filter
            .due_after
            .map(|after| task.due_date.map(|d| d >= after).unwrap_or(false))
            .unwrap_or(true)
        && q.map(|q| task.title.to_lowercase().contains(q)).unwrap_or(true)
}

/// Same ordering as the SQL listing: missing due dates always sort last.
fn compare_tasks(a: &Task, b: &Task, sort: TaskSort) -> Ordering {
    let primary = match sort.field {
        TaskSortField::CreatedAt => a.created_at.cmp(&b.created_at),
        TaskSortField::UpdatedAt => a.updated_at.cmp(&b.updated_at),
        TaskSortField::Priority => a.priority.rank().cmp(&b.priority.rank()),
        TaskSortField::Position => a.position.cmp(&b.position),
        TaskSortField::DueDate => match (a.due_date, b.due_date) {
            (Some(x), Some(y)) => x.cmp(&y),
            (Some(_), None) => return Ordering::Less,
            (None, Some(_)) => return Ordering::Greater,
            (None, None) => Ordering::Equal,
        },
    };
    let ordering = primary.then(a.id.cmp(&b.id));
    match sort.order {
        SortOrder::Asc => ordering,
        SortOrder::Desc => ordering.reverse(),
    }
}

fn is_before(at: Option<DateTime<Utc>>, before: DateTime<Utc>) -> bool {
    at.map(|at| at < before).unwrap_or(false)
}

#[derive(Clone)]
pub struct MemoryTaskRepository {
    store: Arc<MemoryStore>,
}

impl MemoryTaskRepository {
    pub fn new(store: Arc<MemoryStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl TaskRepository for MemoryTaskRepository {
    async fn create(&self, task: &Task) -> Result<Task, AppError> {
        let mut tasks = self.store.tasks.write();
        if tasks.contains_key(&task.id) {
            return Err(AppError::Conflict(format!("Task {} already exists", task.id)));
        }
        tasks.insert(task.id, task.clone());
        Ok(task.clone())
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Task>, AppError> {
        Ok(self
            .store
            .tasks
            .read()
            .get(&id)
            .filter(|t| !t.is_deleted())
            .cloned())
    }

    async fn find_by_id_with_deleted(&self, id: i64) -> Result<Option<Task>, AppError> {
        Ok(self.store.tasks.read().get(&id).cloned())
    }

    async fn list(
        &self,
        filter: &TaskFilter,
        sort: TaskSort,
        page: PageRequest,
    ) -> Result<Page<Task>, AppError> {
        let q = filter.q.as_deref().map(str::to_lowercase);
        let mut matching: Vec<Task> = self
            .store
            .tasks
            .read()
            .values()
            .filter(|t| matches_filter(t, filter, q.as_deref()))
            .cloned()
            .collect();
        matching.sort_by(|a, b| compare_tasks(a, b, sort));
        Ok(Page::from_vec(matching, page))
    }

    async fn max_position(&self, project_id: i64) -> Result<Option<i32>, AppError> {
        Ok(self
            .store
            .tasks
            .read()
            .values()
            .filter(|t| t.project_id == project_id && !t.is_deleted())
            .map(|t| t.position)
            .max())
    }

    async fn update(&self, task: &Task) -> Result<Task, AppError> {
        let mut tasks = self.store.tasks.write();
        match tasks.get_mut(&task.id) {
            Some(stored) if !stored.is_deleted() => {
                *stored = task.clone();
                Ok(stored.clone())
            }
            _ => Err(AppError::NotFound(format!("Task {} not found", task.id))),
        }
    }

    async fn soft_delete(&self, id: i64, at: DateTime<Utc>) -> Result<(), AppError> {
        if let Some(task) = self.store.tasks.write().get_mut(&id) {
            task.deleted_at.get_or_insert(at);
        }
        Ok(())
    }

    async fn restore(&self, id: i64) -> Result<(), AppError> {
        if let Some(task) = self.store.tasks.write().get_mut(&id) {
            task.deleted_at = None;
            task.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn due_for_reminder(
        &self,
        now: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<Task>, AppError> {
        let teams = self.store.teams.read();
        let projects = self.store.projects.read();
        let tasks = self.store.tasks.read();

        let mut due: Vec<Task> = tasks
            .values()
            .filter(|t| {
                !t.is_deleted()
                    && t.status != TaskStatus::Done
                    && t.reminder_sent_at.is_none()
                    && t.due_date.map(|d| d > now && d <= until).unwrap_or(false)
            })
            .filter(|t| {
                projects
                    .get(&t.project_id)
                    .map(|p| project_is_live(&teams, p))
                    .unwrap_or(false)
            })
            .cloned()
            .collect();
        due.sort_by(|a, b| a.due_date.cmp(&b.due_date).then(a.id.cmp(&b.id)));
        Ok(due)
    }

    async fn mark_reminded(&self, ids: &[i64], at: DateTime<Utc>) -> Result<(), AppError> {
        let mut tasks = self.store.tasks.write();
        for id in ids {
            if let Some(task) = tasks.get_mut(id) {
                task.reminder_sent_at = Some(at);
            }
        }
        Ok(())
    }

    async fn purge_deleted(&self, before: DateTime<Utc>) -> Result<u64, AppError> {
        let purged: HashSet<i64> = {
            let mut tasks = self.store.tasks.write();
            let ids: HashSet<i64> = tasks
                .values()
                .filter(|t| is_before(t.deleted_at, before))
                .map(|t| t.id)
                .collect();
            tasks.retain(|id, _| !ids.contains(id));
            ids
        };
        self.store.cascade_tasks(&purged);
        Ok(purged.len() as u64)
    }
}

#[derive(Clone)]
pub struct MemorySubtaskRepository {
    store: Arc<MemoryStore>,
}

impl MemorySubtaskRepository {
    pub fn new(store: Arc<MemoryStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl SubtaskRepository for MemorySubtaskRepository {
    async fn create(&self, subtask: &Subtask) -> Result<Subtask, AppError> {
        self.store.subtasks.write().insert(subtask.id, subtask.clone());
        Ok(subtask.clone())
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Subtask>, AppError> {
        Ok(self
            .store
            .subtasks
            .read()
            .get(&id)
            .filter(|s| s.deleted_at.is_none())
            .cloned())
    }

    async fn list_for_task(&self, task_id: i64) -> Result<Vec<Subtask>, AppError> {
        let mut subtasks: Vec<Subtask> = self
            .store
            .subtasks
            .read()
            .values()
            .filter(|s| s.task_id == task_id && s.deleted_at.is_none())
            .cloned()
            .collect();
        subtasks.sort_by(|a, b| {
            a.position
                .cmp(&b.position)
                .then(a.created_at.cmp(&b.created_at))
                .then(a.id.cmp(&b.id))
        });
        Ok(subtasks)
    }

    async fn update(&self, subtask: &Subtask) -> Result<Subtask, AppError> {
        let mut subtasks = self.store.subtasks.write();
        match subtasks.get_mut(&subtask.id) {
            Some(stored) if stored.deleted_at.is_none() => {
                *stored = subtask.clone();
                Ok(stored.clone())
            }
            _ => Err(AppError::NotFound(format!(
                "Subtask {} not found",
                subtask.id
            ))),
        }
    }

    async fn soft_delete(&self, id: i64, at: DateTime<Utc>) -> Result<(), AppError> {
        if let Some(subtask) = self.store.subtasks.write().get_mut(&id) {
            subtask.deleted_at.get_or_insert(at);
        }
        Ok(())
    }

    async fn purge_deleted(&self, before: DateTime<Utc>) -> Result<u64, AppError> {
        let mut subtasks = self.store.subtasks.write();
        let count = subtasks.len();
        subtasks.retain(|_, s| !is_before(s.deleted_at, before));
        Ok((count - subtasks.len()) as u64)
    }
}

#[derive(Clone)]
pub struct MemoryCommentRepository {
    store: Arc<MemoryStore>,
}

impl MemoryCommentRepository {
    pub fn new(store: Arc<MemoryStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl CommentRepository for MemoryCommentRepository {
    async fn create(&self, comment: &Comment) -> Result<Comment, AppError> {
        self.store.comments.write().insert(comment.id, comment.clone());
        Ok(comment.clone())
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Comment>, AppError> {
        Ok(self
            .store
            .comments
            .read()
            .get(&id)
            .filter(|c| c.deleted_at.is_none())
            .cloned())
    }

    async fn list_for_task(
        &self,
        task_id: i64,
        page: PageRequest,
    ) -> Result<Page<Comment>, AppError> {
        let mut comments: Vec<Comment> = self
            .store
            .comments
            .read()
            .values()
            .filter(|c| c.task_id == task_id && c.deleted_at.is_none())
            .cloned()
            .collect();
        comments.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(Page::from_vec(comments, page))
    }

    async fn update(&self, comment: &Comment) -> Result<Comment, AppError> {
        let mut comments = self.store.comments.write();
        match comments.get_mut(&comment.id) {
            Some(stored) if stored.deleted_at.is_none() => {
                *stored = comment.clone();
                Ok(stored.clone())
            }
            _ => Err(AppError::NotFound(format!(
                "Comment {} not found",
                comment.id
            ))),
        }
    }

    async fn soft_delete(&self, id: i64, at: DateTime<Utc>) -> Result<(), AppError> {
        if let Some(comment) = self.store.comments.write().get_mut(&id) {
            comment.deleted_at.get_or_insert(at);
        }
        Ok(())
    }

    async fn purge_deleted(&self, before: DateTime<Utc>) -> Result<u64, AppError> {
        let mut comments = self.store.comments.write();
        let count = comments.len();
        comments.retain(|_, c| !is_before(c.deleted_at, before));
        Ok((count - comments.len()) as u64)
    }
}

#[derive(Clone)]
pub struct MemoryAttachmentRepository {
    store: Arc<MemoryStore>,
}

impl MemoryAttachmentRepository {
    pub fn new(store: Arc<MemoryStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl AttachmentRepository for MemoryAttachmentRepository {
    async fn create(&self, attachment: &Attachment) -> Result<Attachment, AppError> {
        let mut attachments = self.store.attachments.write();
        if attachments
            .values()
            .any(|a| a.storage_key == attachment.storage_key)
        {
            return Err(AppError::Conflict("Storage key already in use".into()));
        }
        attachments.insert(attachment.id, attachment.clone());
        Ok(attachment.clone())
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Attachment>, AppError> {
        Ok(self
            .store
            .attachments
            .read()
            .get(&id)
            .filter(|a| a.deleted_at.is_none())
            .cloned())
    }

    async fn list_for_task(&self, task_id: i64) -> Result<Vec<Attachment>, AppError> {
        let mut attachments: Vec<Attachment> = self
            .store
            .attachments
            .read()
            .values()
            .filter(|a| a.task_id == task_id && a.deleted_at.is_none())
            .cloned()
            .collect();
        attachments.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(attachments)
    }

    async fn soft_delete(&self, id: i64, at: DateTime<Utc>) -> Result<(), AppError> {
        if let Some(attachment) = self.store.attachments.write().get_mut(&id) {
            attachment.deleted_at.get_or_insert(at);
        }
        Ok(())
    }

    async fn purge_deleted(&self, before: DateTime<Utc>) -> Result<Vec<Attachment>, AppError> {
        let teams = self.store.teams.read();
        let projects = self.store.projects.read();
        let tasks = self.store.tasks.read();
        let mut attachments = self.store.attachments.write();

        let parent_purged = |attachment: &Attachment| -> bool {
            let Some(task) = tasks.get(&attachment.task_id) else {
                return true;
            };
            if is_before(task.deleted_at, before) {
                return true;
            }
            let Some(project) = projects.get(&task.project_id) else {
                return true;
            };
            if is_before(project.deleted_at, before) {
                return true;
            }
            teams
                .get(&project.team_id)
                .map(|team| is_before(team.deleted_at, before))
                .unwrap_or(true)
        };

        let purged: Vec<Attachment> = attachments
            .values()
            .filter(|a| is_before(a.deleted_at, before) || parent_purged(a))
            .cloned()
            .collect();
        for attachment in &purged {
            attachments.remove(&attachment.id);
        }
        Ok(purged)
    }
}
