//! Task entity and repository trait.
//!
//! Maps to the `tasks` table in the database schema.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::value_objects::{TaskFilter, TaskSort};
use crate::shared::error::AppError;
use crate::shared::pagination::{Page, PageRequest};

/// Workflow status of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Todo,
    InProgress,
    InReview,
    Done,
}

impl TaskStatus {
    /// Convert from database string representation.
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "in_progress" => Self::InProgress,
            "in_review" => Self::InReview,
            "done" => Self::Done,
            _ => Self::Todo,
        }
    }

    /// Convert to database string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Todo => "todo",
            Self::InProgress => "in_progress",
            Self::InReview => "in_review",
            Self::Done => "done",
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Priority of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

impl TaskPriority {
    /// Convert from database string representation.
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "low" => Self::Low,
            "high" => Self::High,
            "urgent" => Self::Urgent,
            _ => Self::Medium,
        }
    }

    /// Convert to database string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Urgent => "urgent",
        }
    }

    /// Sort rank, higher is more urgent.
    pub fn rank(&self) -> i32 {
        match self {
            Self::Low => 0,
            Self::Medium => 1,
            Self::High => 2,
            Self::Urgent => 3,
        }
    }
}

impl std::fmt::Display for TaskPriority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Represents a unit of work inside a project.
///
/// Maps to the `tasks` table:
/// - id: BIGINT PRIMARY KEY (Snowflake ID)
/// - project_id: BIGINT NOT NULL REFERENCES projects(id)
/// - title: VARCHAR(200) NOT NULL
/// - description: TEXT NULL
/// - status / priority: VARCHAR(16) NOT NULL
/// - reporter_id: BIGINT NOT NULL REFERENCES users(id)
/// - assignee_ids: BIGINT[] NOT NULL
/// - tags: TEXT[] NOT NULL
/// - due_date: TIMESTAMPTZ NULL
/// - position: INTEGER NOT NULL
/// - estimated_hours: DOUBLE PRECISION NULL
/// - completed_at / reminder_sent_at: TIMESTAMPTZ NULL
/// - created_at / updated_at: TIMESTAMPTZ NOT NULL
/// - deleted_at: TIMESTAMPTZ NULL (soft delete)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: i64,
    pub project_id: i64,
    pub title: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub reporter_id: i64,
    pub assignee_ids: Vec<i64>,
    pub tags: Vec<String>,
    pub due_date: Option<DateTime<Utc>>,
    pub position: i32,
    pub estimated_hours: Option<f64>,
    pub completed_at: Option<DateTime<Utc>>,

    /// Set once a due-soon reminder has been sent; cleared when the due date moves
    pub reminder_sent_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Task {
    pub fn new(id: i64, project_id: i64, title: String, reporter_id: i64) -> Self {
        let now = Utc::now();
        Self {
            id,
            project_id,
            title,
            description: None,
            status: TaskStatus::Todo,
            priority: TaskPriority::Medium,
            reporter_id,
            assignee_ids: Vec::new(),
            tags: Vec::new(),
            due_date: None,
            position: 0,
            estimated_hours: None,
            completed_at: None,
            reminder_sent_at: None,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    /// Move to `status`, maintaining `completed_at`.
    pub fn set_status(&mut self, status: TaskStatus, at: DateTime<Utc>) {
        if self.status == status {
            return;
        }
        self.completed_at = if status == TaskStatus::Done { Some(at) } else { None };
        self.status = status;
    }

    /// Change the due date; a new date re-arms the reminder.
    pub fn set_due_date(&mut self, due_date: Option<DateTime<Utc>>) {
        if self.due_date != due_date {
            self.reminder_sent_at = None;
        }
        self.due_date = due_date;
    }

    pub fn is_assigned_to(&self, user_id: i64) -> bool {
        self.assignee_ids.contains(&user_id)
    }

    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.status != TaskStatus::Done && self.due_date.map(|d| d < now).unwrap_or(false)
    }

    /// Users that follow the task: reporter first, then assignees.
    pub fn watchers(&self) -> Vec<i64> {
        let mut ids = vec![self.reporter_id];
        for id in &self.assignee_ids {
            if !ids.contains(id) {
                ids.push(*id);
            }
        }
        ids
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// Repository trait for Task data access operations.
#[async_trait]
pub trait TaskRepository: Send + Sync {
    async fn create(&self, task: &Task) -> Result<Task, AppError>;

    /// Find a live task.
    async fn find_by_id(&self, id: i64) -> Result<Option<Task>, AppError>;

    /// Find a task whether or not it is soft-deleted.
    async fn find_by_id_with_deleted(&self, id: i64) -> Result<Option<Task>, AppError>;

    /// Filtered, sorted, paginated live tasks of a project.
    async fn list(
        &self,
        filter: &TaskFilter,
        sort: TaskSort,
        page: PageRequest,
    ) -> Result<Page<Task>, AppError>;

    /// Highest position in a project, if any task exists.
    async fn max_position(&self, project_id: i64) -> Result<Option<i32>, AppError>;

    /// Persist every mutable field.
    async fn update(&self, task: &Task) -> Result<Task, AppError>;

    async fn soft_delete(&self, id: i64, at: DateTime<Utc>) -> Result<(), AppError>;

    async fn restore(&self, id: i64) -> Result<(), AppError>;

    /// Live, unfinished tasks due in `(now, until]` that have not been reminded,
    /// excluding tasks under deleted projects or teams.
    async fn due_for_reminder(
        &self,
        now: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<Task>, AppError>;

    async fn mark_reminded(&self, ids: &[i64], at: DateTime<Utc>) -> Result<(), AppError>;

    /// Physically delete tasks soft-deleted before `before`, with everything they own.
    async fn purge_deleted(&self, before: DateTime<Utc>) -> Result<u64, AppError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use test_case::test_case;

    // ==========================================================================
    // Enum Tests
    // ==========================================================================

    #[test_case(TaskStatus::Todo, "todo")]
    #[test_case(TaskStatus::InProgress, "in_progress")]
    #[test_case(TaskStatus::InReview, "in_review")]
    #[test_case(TaskStatus::Done, "done")]
    fn test_task_status_strings(status: TaskStatus, s: &str) {
        assert_eq!(status.as_str(), s);
        assert_eq!(TaskStatus::from_str(s), status);
        assert_eq!(serde_json::to_value(status).unwrap(), s);
    }

    #[test]
    fn test_priority_rank_is_ordered() {
        assert!(TaskPriority::Low.rank() < TaskPriority::Medium.rank());
        assert!(TaskPriority::Medium.rank() < TaskPriority::High.rank());
        assert!(TaskPriority::High.rank() < TaskPriority::Urgent.rank());
        assert_eq!(TaskPriority::from_str("URGENT"), TaskPriority::Urgent);
    }

    // ==========================================================================
    // Task Entity Tests
    // ==========================================================================

    #[test]
    fn test_set_status_tracks_completion() {
        let mut task = Task::new(1, 2, "Write docs".into(), 3);
        let now = Utc::now();

        task.set_status(TaskStatus::Done, now);
        assert_eq!(task.completed_at, Some(now));

        // Re-applying done keeps the original completion time
        task.set_status(TaskStatus::Done, now + Duration::hours(1));
        assert_eq!(task.completed_at, Some(now));

        task.set_status(TaskStatus::InReview, now);
        assert!(task.completed_at.is_none());
    }

    #[test]
    fn test_set_due_date_rearms_reminder() {
        let mut task = Task::new(1, 2, "Ship".into(), 3);
        let due = Utc::now() + Duration::hours(5);
        task.set_due_date(Some(due));
        task.reminder_sent_at = Some(Utc::now());

        task.set_due_date(Some(due));
        assert!(task.reminder_sent_at.is_some());

        task.set_due_date(Some(due + Duration::days(1)));
        assert!(task.reminder_sent_at.is_none());
    }

    #[test]
    fn test_is_overdue() {
        let now = Utc::now();
        let mut task = Task::new(1, 2, "Ship".into(), 3);
        assert!(!task.is_overdue(now));

        task.due_date = Some(now - Duration::hours(1));
        assert!(task.is_overdue(now));

        task.set_status(TaskStatus::Done, now);
        assert!(!task.is_overdue(now));
    }

    #[test]
    fn test_watchers_dedupes_reporter() {
        let mut task = Task::new(1, 2, "Ship".into(), 3);
        task.assignee_ids = vec![3, 4, 5];
        assert_eq!(task.watchers(), vec![3, 4, 5]);
    }
}
