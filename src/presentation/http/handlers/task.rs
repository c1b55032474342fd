//! Task Handlers

use axum::{extract::State, http::StatusCode, Json};

use crate::application::dto::request::{CreateTaskRequest, TaskListQuery, UpdateTaskRequest};
use crate::application::dto::response::{PageResponse, TaskResponse};
use crate::domain::value_objects::{TaskFilter, TaskSort};
use crate::presentation::http::extractors::{page_request, AuthUser, Path, Query, ValidatedJson};
use crate::shared::error::AppError;
use crate::shared::validation::parse_id;
use crate::startup::AppState;

/// Filter, sort and paginate the tasks of a project
pub async fn list_tasks(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(project_id): Path<String>,
    Query(query): Query<TaskListQuery>,
) -> Result<Json<PageResponse<TaskResponse>>, AppError> {
    let project_id = parse_id(&project_id, "project")?;
    let page = page_request(&state, query.page, query.limit);
    let assignee_id = query
        .assignee_id
        .as_deref()
        .map(|raw| parse_id(raw, "assignee"))
        .transpose()?;

    if let (Some(after), Some(before)) = (query.due_after, query.due_before) {
        if after > before {
            return Err(AppError::BadRequest(
                "due_after must not be later than due_before".into(),
            ));
        }
    }

    let filter = TaskFilter {
        project_id,
        status: query.status,
        priority: query.priority,
        assignee_id,
        tag: query.tag.filter(|t| !t.trim().is_empty()),
        due_before: query.due_before,
        due_after: query.due_after,
        q: query.q.filter(|q| !q.trim().is_empty()),
    };
    let sort = TaskSort::new(query.sort, query.order);

    let tasks = state.tasks.list(auth.user_id, filter, sort, page).await?;
    Ok(Json(tasks.into()))
}

pub async fn create_task(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(project_id): Path<String>,
    ValidatedJson(body): ValidatedJson<CreateTaskRequest>,
) -> Result<(StatusCode, Json<TaskResponse>), AppError> {
    let project_id = parse_id(&project_id, "project")?;
    let task = state.tasks.create(auth.user_id, project_id, body).await?;
    Ok((StatusCode::CREATED, Json(TaskResponse::from(task))))
}

pub async fn get_task(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(task_id): Path<String>,
) -> Result<Json<TaskResponse>, AppError> {
    let task_id = parse_id(&task_id, "task")?;
    let task = state.tasks.get(auth.user_id, task_id).await?;
    Ok(Json(TaskResponse::from(task)))
}

/// Partial update
pub async fn update_task(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(task_id): Path<String>,
    ValidatedJson(body): ValidatedJson<UpdateTaskRequest>,
) -> Result<Json<TaskResponse>, AppError> {
    let task_id = parse_id(&task_id, "task")?;
    let task = state.tasks.update(auth.user_id, task_id, body).await?;
    Ok(Json(TaskResponse::from(task)))
}

pub async fn delete_task(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(task_id): Path<String>,
) -> Result<StatusCode, AppError> {
    let task_id = parse_id(&task_id, "task")?;
    state.tasks.delete(auth.user_id, task_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn restore_task(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(task_id): Path<String>,
) -> Result<Json<TaskResponse>, AppError> {
    let task_id = parse_id(&task_id, "task")?;
    let task = state.tasks.restore(auth.user_id, task_id).await?;
    Ok(Json(TaskResponse::from(task)))
}
