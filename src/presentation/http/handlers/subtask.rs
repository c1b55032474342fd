//! Subtask Handlers

use axum::{extract::State, http::StatusCode, Json};

use crate::application::dto::request::{CreateSubtaskRequest, UpdateSubtaskRequest};
use crate::application::dto::response::SubtaskResponse;
use crate::presentation::http::extractors::{AuthUser, Path, ValidatedJson};
use crate::shared::error::AppError;
use crate::shared::validation::parse_id;
use crate::startup::AppState;

pub async fn list_subtasks(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(task_id): Path<String>,
) -> Result<Json<Vec<SubtaskResponse>>, AppError> {
    let task_id = parse_id(&task_id, "task")?;
    let subtasks = state.subtasks.list(auth.user_id, task_id).await?;
    Ok(Json(subtasks.into_iter().map(SubtaskResponse::from).collect()))
}

pub async fn create_subtask(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(task_id): Path<String>,
    ValidatedJson(body): ValidatedJson<CreateSubtaskRequest>,
) -> Result<(StatusCode, Json<SubtaskResponse>), AppError> {
    let task_id = parse_id(&task_id, "task")?;
    let subtask = state.subtasks.create(auth.user_id, task_id, body).await?;
    Ok((StatusCode::CREATED, Json(SubtaskResponse::from(subtask))))
}

pub async fn update_subtask(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(subtask_id): Path<String>,
    ValidatedJson(body): ValidatedJson<UpdateSubtaskRequest>,
) -> Result<Json<SubtaskResponse>, AppError> {
    let subtask_id = parse_id(&subtask_id, "subtask")?;
    let subtask = state.subtasks.update(auth.user_id, subtask_id, body).await?;
    Ok(Json(SubtaskResponse::from(subtask)))
}

pub async fn delete_subtask(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(subtask_id): Path<String>,
) -> Result<StatusCode, AppError> {
    let subtask_id = parse_id(&subtask_id, "subtask")?;
    state.subtasks.delete(auth.user_id, subtask_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
