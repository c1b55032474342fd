//! Notification Handlers
//!
//! The caller's own inbox. Notifications are created by background jobs only.

use axum::{extract::State, http::StatusCode, Json};

use crate::application::dto::request::NotificationListQuery;
use crate::application::dto::response::{
    MarkedResponse, NotificationResponse, PageResponse, UnreadCountResponse,
};
use crate::presentation::http::extractors::{page_request, AuthUser, Path, Query};
use crate::shared::error::AppError;
use crate::shared::validation::parse_id;
use crate::startup::AppState;

/// Newest first
pub async fn list_notifications(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<NotificationListQuery>,
) -> Result<Json<PageResponse<NotificationResponse>>, AppError> {
    let page = page_request(&state, query.page, query.limit);
    let notifications = state
        .notifications
        .list(auth.user_id, query.unread_only, page)
        .await?;
    Ok(Json(notifications.into()))
}

pub async fn unread_count(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<UnreadCountResponse>, AppError> {
    let unread = state.notifications.unread_count(auth.user_id).await?;
    Ok(Json(UnreadCountResponse { unread }))
}

pub async fn mark_read(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(notification_id): Path<String>,
) -> Result<Json<NotificationResponse>, AppError> {
    let notification_id = parse_id(&notification_id, "notification")?;
    let notification = state
        .notifications
        .mark_read(auth.user_id, notification_id)
        .await?;
    Ok(Json(NotificationResponse::from(notification)))
}

pub async fn mark_all_read(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<MarkedResponse>, AppError> {
    let updated = state.notifications.mark_all_read(auth.user_id).await?;
    Ok(Json(MarkedResponse { updated }))
}

pub async fn delete_notification(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(notification_id): Path<String>,
) -> Result<StatusCode, AppError> {
    let notification_id = parse_id(&notification_id, "notification")?;
    state
        .notifications
        .delete(auth.user_id, notification_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
