//! Authentication Handlers

use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    Json,
};

use crate::application::dto::request::{
    ChangePasswordRequest, LoginRequest, RefreshTokenRequest, RegisterRequest,
};
use crate::application::dto::response::{AuthResponse, TokenResponse, UserResponse};
use crate::application::services::{AuthError, RegisterInput};
use crate::presentation::http::extractors::{AuthUser, ValidatedJson};
use crate::shared::error::AppError;
use crate::startup::AppState;

fn user_agent(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.chars().take(255).collect())
}

/// Register a new user
pub async fn register(
    State(state): State<AppState>,
    headers: HeaderMap,
    ValidatedJson(body): ValidatedJson<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), AppError> {
    let input = RegisterInput {
        username: body.username,
        email: body.email,
        password: body.password,
        display_name: body.display_name,
    };

    let (user, tokens) = state.auth.register(input, user_agent(&headers)).await?;

    let response = AuthResponse {
        user: UserResponse::from_user(user, true),
        tokens: TokenResponse::from(tokens),
    };

    Ok((StatusCode::CREATED, Json(response)))
}

/// Login with credentials
pub async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    ValidatedJson(body): ValidatedJson<LoginRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    let (user, tokens) = state
        .auth
        .login(&body.email, &body.password, user_agent(&headers))
        .await?;

    Ok(Json(AuthResponse {
        user: UserResponse::from_user(user, true),
        tokens: TokenResponse::from(tokens),
    }))
}

/// Refresh access token (rotates the refresh token)
pub async fn refresh_token(
    State(state): State<AppState>,
    ValidatedJson(body): ValidatedJson<RefreshTokenRequest>,
) -> Result<Json<TokenResponse>, AppError> {
    let tokens = state.auth.refresh(&body.refresh_token).await?;
    Ok(Json(TokenResponse::from(tokens)))
}

/// Logout (revoke one refresh token)
pub async fn logout(
    State(state): State<AppState>,
    ValidatedJson(body): ValidatedJson<RefreshTokenRequest>,
) -> Result<StatusCode, AppError> {
    // Unknown or already revoked tokens are not an error for logout
    match state.auth.logout(&body.refresh_token).await {
        Ok(()) | Err(AuthError::SessionNotFound) => Ok(StatusCode::NO_CONTENT),
        Err(e) => Err(e.into()),
    }
}

/// Revoke every session of the current user
pub async fn logout_all(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<StatusCode, AppError> {
    let revoked = state.auth.logout_all(auth.user_id).await?;
    tracing::info!(user_id = auth.user_id, revoked, "Logged out everywhere");
    Ok(StatusCode::NO_CONTENT)
}

/// Change password; all sessions are revoked
pub async fn change_password(
    State(state): State<AppState>,
    auth: AuthUser,
    ValidatedJson(body): ValidatedJson<ChangePasswordRequest>,
) -> Result<StatusCode, AppError> {
    state
        .auth
        .change_password(auth.user_id, &body.current_password, &body.new_password)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Current user
pub async fn me(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<UserResponse>, AppError> {
    let user = state.users.get_user(auth.user_id).await?;
    Ok(Json(UserResponse::from_user(user, true)))
}
