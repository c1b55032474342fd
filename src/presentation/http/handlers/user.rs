//! User Handlers

use axum::{extract::State, http::StatusCode, Json};

use crate::application::dto::request::{UpdateProfileRequest, UserSearchQuery};
use crate::application::dto::response::{PageResponse, UserResponse};
use crate::presentation::http::extractors::{page_request, AuthUser, Path, Query, ValidatedJson};
use crate::shared::error::AppError;
use crate::shared::validation::parse_id;
use crate::startup::AppState;

/// Get current authenticated user
pub async fn get_current_user(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<UserResponse>, AppError> {
    let user = state.users.get_user(auth.user_id).await?;
    Ok(Json(UserResponse::from_user(user, true)))
}

/// Update current user profile
pub async fn update_current_user(
    State(state): State<AppState>,
    auth: AuthUser,
    ValidatedJson(body): ValidatedJson<UpdateProfileRequest>,
) -> Result<Json<UserResponse>, AppError> {
    let user = state.users.update_profile(auth.user_id, body).await?;
    Ok(Json(UserResponse::from_user(user, true)))
}

/// Deactivate own account
pub async fn deactivate_current_user(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<StatusCode, AppError> {
    state.users.deactivate(auth.user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Get user by ID (public profile)
pub async fn get_user(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(user_id): Path<String>,
) -> Result<Json<UserResponse>, AppError> {
    let user_id = parse_id(&user_id, "user")?;
    let user = state.users.get_user(user_id).await?;
    Ok(Json(UserResponse::public(user)))
}

/// Search users by username or display name prefix
pub async fn search_users(
    State(state): State<AppState>,
    _auth: AuthUser,
    Query(query): Query<UserSearchQuery>,
) -> Result<Json<PageResponse<UserResponse>>, AppError> {
    let page = page_request(&state, query.page, query.limit);
    let term = query.q.unwrap_or_default();

    let users = state.users.search(term.trim(), page).await?;
    Ok(Json(users.map(UserResponse::public).into()))
}
