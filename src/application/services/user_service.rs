//! User Service
//!
//! Handles user profile and account operations.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;

use crate::application::dto::request::UpdateProfileRequest;
use crate::application::realtime::EventBroadcaster;
use crate::domain::{Repositories, User};
use crate::shared::error::AppError;
use crate::shared::pagination::{Page, PageRequest};

const MAX_DISPLAY_NAME: usize = 64;
const MAX_AVATAR_URL: usize = 2048;
const MAX_BIO: usize = 500;

/// User service trait
#[async_trait]
pub trait UserService: Send + Sync {
    /// Get an active user by ID
    async fn get_user(&self, user_id: i64) -> Result<User, UserError>;

    /// Update own profile
    async fn update_profile(&self, user_id: i64, update: UpdateProfileRequest) -> Result<User, UserError>;

    /// Prefix search on username and display name
    async fn search(&self, query: &str, page: PageRequest) -> Result<Page<User>, UserError>;

    /// Deactivate own account and revoke its sessions
    async fn deactivate(&self, user_id: i64) -> Result<(), UserError>;
}

/// User service errors
#[derive(Debug, thiserror::Error)]
pub enum UserError {
    #[error("User not found")]
    NotFound,

    #[error("{field}: {message}")]
    Invalid {
        field: &'static str,
        message: &'static str,
    },

    #[error(transparent)]
    Repository(#[from] AppError),
}

impl From<UserError> for AppError {
    fn from(e: UserError) -> Self {
        match e {
            UserError::NotFound => AppError::NotFound(e.to_string()),
            UserError::Invalid { field, message } => AppError::invalid_field(field, message),
            UserError::Repository(e) => e,
        }
    }
}

/// Trim a nullable text field; blank strings clear it.
fn normalize_text(
    value: Option<String>,
    field: &'static str,
    max: usize,
    message: &'static str,
) -> Result<Option<String>, UserError> {
    let Some(value) = value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty()) else {
        return Ok(None);
    };
    if value.chars().count() > max {
        return Err(UserError::Invalid { field, message });
    }
    Ok(Some(value))
}

/// UserService implementation
pub struct UserServiceImpl {
    repos: Repositories,
    events: Arc<dyn EventBroadcaster>,
}

impl UserServiceImpl {
    pub fn new(repos: Repositories, events: Arc<dyn EventBroadcaster>) -> Self {
        Self { repos, events }
    }
}

#[async_trait]
impl UserService for UserServiceImpl {
    async fn get_user(&self, user_id: i64) -> Result<User, UserError> {
        self.repos
            .users
            .find_by_id(user_id)
            .await?
            .filter(|u| u.is_active)
            .ok_or(UserError::NotFound)
    }

    async fn update_profile(&self, user_id: i64, update: UpdateProfileRequest) -> Result<User, UserError> {
        let mut user = self.get_user(user_id).await?;

        if let Some(display_name) = update.display_name {
            user.display_name = normalize_text(
                display_name,
                "display_name",
                MAX_DISPLAY_NAME,
                "Display name must be at most 64 characters",
            )?;
        }

        if let Some(avatar_url) = update.avatar_url {
            let avatar_url = normalize_text(
                avatar_url,
                "avatar_url",
                MAX_AVATAR_URL,
                "Avatar URL is too long",
            )?;
            if let Some(url) = &avatar_url {
                if !(url.starts_with("https://") || url.starts_with("http://")) {
                    return Err(UserError::Invalid {
                        field: "avatar_url",
                        message: "Avatar URL must be an http(s) URL",
                    });
                }
            }
            user.avatar_url = avatar_url;
        }

        if let Some(bio) = update.bio {
            user.bio = normalize_text(bio, "bio", MAX_BIO, "Bio must be at most 500 characters")?;
        }

        user.updated_at = Utc::now();
        Ok(self.repos.users.update(&user).await?)
    }

    async fn search(&self, query: &str, page: PageRequest) -> Result<Page<User>, UserError> {
        Ok(self.repos.users.search(query.trim(), page).await?)
    }

    async fn deactivate(&self, user_id: i64) -> Result<(), UserError> {
        let mut user = self.get_user(user_id).await?;
        user.is_active = false;
        user.updated_at = Utc::now();
        self.repos.users.update(&user).await?;
        let revoked = self.repos.sessions.revoke_all_for_user(user_id).await?;
        self.events.disconnect_user(user_id);

        tracing::info!(user_id, revoked, "User deactivated");
        Ok(())
    }
}
