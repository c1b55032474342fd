//! Query filters and sort orders passed from services to repositories.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::domain::entities::{ProjectStatus, TaskPriority, TaskStatus};

/// Which projects a listing may return.
#[derive(Debug, Clone, Default)]
pub struct ProjectFilter {
    /// Only projects this user can view are returned
    pub viewer_id: i64,
    pub team_id: Option<i64>,
    pub status: Option<ProjectStatus>,

    /// Case-insensitive substring of the name
    pub q: Option<String>,
}

/// Task listing filter. All conditions are combined with AND.
#[derive(Debug, Clone, Default)]
pub struct TaskFilter {
    pub project_id: i64,
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    pub assignee_id: Option<i64>,
    pub tag: Option<String>,
    pub due_before: Option<DateTime<Utc>>,
    pub due_after: Option<DateTime<Utc>>,

    /// Case-insensitive substring of the title
    pub q: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskSortField {
    #[default]
    CreatedAt,
    UpdatedAt,
    DueDate,
    Priority,
    Position,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

/// Sort specification for task listings. Ties break on id in the same direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TaskSort {
    pub field: TaskSortField,
    pub order: SortOrder,
}

impl TaskSort {
    pub fn new(field: Option<TaskSortField>, order: Option<SortOrder>) -> Self {
        let field = field.unwrap_or_default();
        // Positions read naturally top to bottom
        let default_order = if field == TaskSortField::Position {
            SortOrder::Asc
        } else {
            SortOrder::Desc
        };
        Self {
            field,
            order: order.unwrap_or(default_order),
        }
    }
}
