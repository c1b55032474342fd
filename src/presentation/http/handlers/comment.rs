//! Comment Handlers

use axum::{extract::State, http::StatusCode, Json};

use crate::application::dto::request::{
    CreateCommentRequest, PaginationQuery, UpdateCommentRequest,
};
use crate::application::dto::response::{CommentResponse, PageResponse};
use crate::presentation::http::extractors::{page_request, AuthUser, Path, Query, ValidatedJson};
use crate::shared::error::AppError;
use crate::shared::validation::parse_id;
use crate::startup::AppState;

/// Comments of a task, oldest first
pub async fn list_comments(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(task_id): Path<String>,
    Query(query): Query<PaginationQuery>,
) -> Result<Json<PageResponse<CommentResponse>>, AppError> {
    let task_id = parse_id(&task_id, "task")?;
    let page = page_request(&state, query.page, query.limit);
    let comments = state.comments.list(auth.user_id, task_id, page).await?;
    Ok(Json(comments.into()))
}

pub async fn create_comment(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(task_id): Path<String>,
    ValidatedJson(body): ValidatedJson<CreateCommentRequest>,
) -> Result<(StatusCode, Json<CommentResponse>), AppError> {
    let task_id = parse_id(&task_id, "task")?;
    let comment = state.comments.create(auth.user_id, task_id, body).await?;
    Ok((StatusCode::CREATED, Json(CommentResponse::from(comment))))
}

/// Edit own comment
pub async fn update_comment(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(comment_id): Path<String>,
    ValidatedJson(body): ValidatedJson<UpdateCommentRequest>,
) -> Result<Json<CommentResponse>, AppError> {
    let comment_id = parse_id(&comment_id, "comment")?;
    let comment = state
        .comments
        .update(auth.user_id, comment_id, body.content)
        .await?;
    Ok(Json(CommentResponse::from(comment)))
}

pub async fn delete_comment(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(comment_id): Path<String>,
) -> Result<StatusCode, AppError> {
    let comment_id = parse_id(&comment_id, "comment")?;
    state.comments.delete(auth.user_id, comment_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
