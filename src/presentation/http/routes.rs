//! Route Configuration
//!
//! Configures all HTTP routes for the API.

use axum::{
    extract::DefaultBodyLimit,
    handler::Handler,
    middleware,
    routing::{delete, get, patch, post},
    Router,
};
use tower_http::compression::CompressionLayer;

use super::handlers;
use crate::presentation::middleware::{
    auth_middleware, create_cors_layer, trace_layer, track_metrics, SecurityHeadersLayer,
};
use crate::presentation::websocket::ws_handler;
use crate::startup::AppState;

/// Room for multipart boundaries and part headers around the file itself
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Create the main router with every middleware layer applied
pub fn create_router(state: AppState) -> Router {
    let settings = state.settings.clone();

    Router::new()
        .nest("/api", api_routes(state.clone()))
        // WebSocket gateway endpoint
        .route("/ws", get(ws_handler))
        // Health check endpoints
        .route("/health", get(handlers::health::health_check))
        .route("/health/live", get(handlers::health::liveness))
        .route("/health/ready", get(handlers::health::readiness))
        // Prometheus metrics endpoint
        .route("/metrics", get(handlers::metrics::metrics_handler))
        .layer(middleware::from_fn(track_metrics))
        .layer(trace_layer())
        .layer(CompressionLayer::new())
        .layer(create_cors_layer(&settings.cors))
        // Outermost so every response carries the headers
        .layer(SecurityHeadersLayer::from_settings(&settings.server))
        .with_state(state)
}

/// `/api` routes
fn api_routes(state: AppState) -> Router<AppState> {
    let protected = Router::new()
        .merge(account_routes())
        .merge(user_routes())
        .merge(team_routes())
        .merge(project_routes())
        .merge(task_routes(&state))
        .merge(notification_routes())
        .route_layer(middleware::from_fn_with_state(state, auth_middleware));

    Router::new().merge(auth_routes()).merge(protected)
}

/// Authentication routes (public)
fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(handlers::auth::register))
        .route("/auth/login", post(handlers::auth::login))
        .route("/auth/refresh", post(handlers::auth::refresh_token))
        .route("/auth/logout", post(handlers::auth::logout))
}

/// Authentication routes that need a bearer token
fn account_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/me", get(handlers::auth::me))
        .route("/auth/logout-all", post(handlers::auth::logout_all))
        .route("/auth/change-password", post(handlers::auth::change_password))
}

fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(handlers::user::search_users))
        .route(
            "/users/me",
            get(handlers::user::get_current_user)
                .patch(handlers::user::update_current_user)
                .delete(handlers::user::deactivate_current_user),
        )
        .route("/users/{user_id}", get(handlers::user::get_user))
}

fn team_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/teams",
            get(handlers::team::list_teams).post(handlers::team::create_team),
        )
        .route(
            "/teams/{team_id}",
            get(handlers::team::get_team)
                .patch(handlers::team::update_team)
                .delete(handlers::team::delete_team),
        )
        .route(
            "/teams/{team_id}/members",
            get(handlers::team::list_members).post(handlers::team::add_member),
        )
        .route(
            "/teams/{team_id}/members/{user_id}",
            patch(handlers::team::update_member).delete(handlers::team::remove_member),
        )
        .route("/teams/{team_id}/presence", get(handlers::team::presence))
}

fn project_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/projects",
            get(handlers::project::list_projects).post(handlers::project::create_project),
        )
        .route(
            "/projects/{project_id}",
            get(handlers::project::get_project)
                .patch(handlers::project::update_project)
                .delete(handlers::project::delete_project),
        )
        .route(
            "/projects/{project_id}/members",
            get(handlers::project::list_members).post(handlers::project::add_member),
        )
        .route(
            "/projects/{project_id}/members/{user_id}",
            patch(handlers::project::update_member).delete(handlers::project::remove_member),
        )
        .route(
            "/projects/{project_id}/activity",
            get(handlers::activity::project_activity),
        )
        .route(
            "/projects/{project_id}/stats",
            get(handlers::project::project_stats),
        )
        .route(
            "/projects/{project_id}/tasks",
            get(handlers::task::list_tasks).post(handlers::task::create_task),
        )
}

/// Tasks and everything hanging off them
fn task_routes(state: &AppState) -> Router<AppState> {
    let upload_limit = state.settings.uploads.max_file_size + MULTIPART_OVERHEAD;

    Router::new()
        .route(
            "/tasks/{task_id}",
            get(handlers::task::get_task)
                .patch(handlers::task::update_task)
                .delete(handlers::task::delete_task),
        )
        .route("/tasks/{task_id}/restore", post(handlers::task::restore_task))
        .route("/tasks/{task_id}/activity", get(handlers::activity::task_activity))
        .route(
            "/tasks/{task_id}/subtasks",
            get(handlers::subtask::list_subtasks).post(handlers::subtask::create_subtask),
        )
        .route(
            "/subtasks/{subtask_id}",
            patch(handlers::subtask::update_subtask).delete(handlers::subtask::delete_subtask),
        )
        .route(
            "/tasks/{task_id}/comments",
            get(handlers::comment::list_comments).post(handlers::comment::create_comment),
        )
        .route(
            "/comments/{comment_id}",
            patch(handlers::comment::update_comment).delete(handlers::comment::delete_comment),
        )
        .route(
            "/tasks/{task_id}/attachments",
            get(handlers::attachment::list_attachments).post(
                handlers::attachment::upload_attachment
                    .layer(DefaultBodyLimit::max(upload_limit)),
            ),
        )
        .route(
            "/attachments/{attachment_id}",
            get(handlers::attachment::download_attachment)
                .delete(handlers::attachment::delete_attachment),
        )
}

fn notification_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/notifications",
            get(handlers::notification::list_notifications),
        )
        .route(
            "/notifications/unread-count",
            get(handlers::notification::unread_count),
        )
        .route(
            "/notifications/read-all",
            post(handlers::notification::mark_all_read),
        )
        .route(
            "/notifications/{notification_id}/read",
            patch(handlers::notification::mark_read),
        )
        .route(
            "/notifications/{notification_id}",
            delete(handlers::notification::delete_notification),
        )
}
