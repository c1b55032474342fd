//! Activity Feed Handlers

use axum::{extract::State, Json};

use crate::application::dto::request::PaginationQuery;
use crate::application::dto::response::{ActivityResponse, PageResponse};
use crate::presentation::http::extractors::{page_request, AuthUser, Path, Query};
use crate::shared::error::AppError;
use crate::shared::validation::parse_id;
use crate::startup::AppState;

pub async fn project_activity(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(project_id): Path<String>,
    Query(query): Query<PaginationQuery>,
) -> Result<Json<PageResponse<ActivityResponse>>, AppError> {
    let project_id = parse_id(&project_id, "project")?;
    let page = page_request(&state, query.page, query.limit);
    let entries = state
        .activity
        .list_for_project(auth.user_id, project_id, page)
        .await?;
    Ok(Json(entries.into()))
}

pub async fn task_activity(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(task_id): Path<String>,
    Query(query): Query<PaginationQuery>,
) -> Result<Json<PageResponse<ActivityResponse>>, AppError> {
    let task_id = parse_id(&task_id, "task")?;
    let page = page_request(&state, query.page, query.limit);
    let entries = state.activity.list_for_task(auth.user_id, task_id, page).await?;
    Ok(Json(entries.into()))
}
