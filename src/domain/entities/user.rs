//! User entity and repository trait.
//!
//! Maps to the `users` table in the database schema.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::shared::error::AppError;
use crate::shared::pagination::{Page, PageRequest};

/// Represents a user account.
///
/// Maps to the `users` table:
/// - id: BIGINT PRIMARY KEY (Snowflake ID)
/// - username: VARCHAR(32) NOT NULL UNIQUE
/// - email: VARCHAR(255) NOT NULL UNIQUE
/// - password_hash: VARCHAR(255) NOT NULL
/// - display_name: VARCHAR(64) NULL
/// - avatar_url: TEXT NULL
/// - bio: TEXT NULL
/// - is_active: BOOLEAN NOT NULL DEFAULT TRUE
/// - last_seen_at: TIMESTAMPTZ NULL
/// - created_at / updated_at: TIMESTAMPTZ NOT NULL
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Snowflake ID (primary key)
    pub id: i64,

    /// Username (2-32 characters, unique)
    pub username: String,

    /// Email address (unique, stored lowercase)
    pub email: String,

    /// Argon2 password hash
    #[serde(skip_serializing)]
    pub password_hash: String,

    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    pub bio: Option<String>,

    /// False once the account has been deactivated
    pub is_active: bool,

    /// Last time a realtime session of this user disconnected
    pub last_seen_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Create a new active user.
    pub fn new(id: i64, username: String, email: String, password_hash: String) -> Self {
        let now = Utc::now();
        Self {
            id,
            username,
            email,
            password_hash,
            display_name: None,
            avatar_url: None,
            bio: None,
            is_active: true,
            last_seen_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Get the user's display name, falling back to username if not set.
    pub fn display_name_or_username(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.username)
    }

    /// Case-insensitive prefix match used by user search.
    pub fn matches_prefix(&self, query: &str) -> bool {
        let query = query.to_lowercase();
        self.username.to_lowercase().starts_with(&query)
            || self
                .display_name
                .as_deref()
                .map(|d| d.to_lowercase().starts_with(&query))
                .unwrap_or(false)
    }
}

/// Repository trait for User data access operations.
///
/// Implementations of this trait handle the actual database interactions.
/// The trait is defined in the domain layer to maintain dependency inversion.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Find a user by their Snowflake ID.
    async fn find_by_id(&self, id: i64) -> Result<Option<User>, AppError>;

    /// Find every existing user among `ids`.
    async fn find_by_ids(&self, ids: &[i64]) -> Result<Vec<User>, AppError>;

    /// Find a user by their email address (case-insensitive).
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError>;

    /// Find a user by username (case-insensitive).
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, AppError>;

    /// Create a new user. Conflicts on duplicate username or email.
    async fn create(&self, user: &User) -> Result<User, AppError>;

    /// Update profile, password and activity fields.
    async fn update(&self, user: &User) -> Result<User, AppError>;

    /// Active users whose username or display name starts with `query`.
    async fn search(&self, query: &str, page: PageRequest) -> Result<Page<User>, AppError>;

    /// Record the last time the user was seen online.
    async fn touch_last_seen(&self, id: i64, at: DateTime<Utc>) -> Result<(), AppError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_user() -> User {
        User::new(
            12345678901234567,
            "testuser".to_string(),
            "test@example.com".to_string(),
            "hashed_password".to_string(),
        )
    }

    #[test]
    fn test_new_user_is_active() {
        let user = create_test_user();
        assert!(user.is_active);
        assert!(user.last_seen_at.is_none());
        assert_eq!(user.created_at, user.updated_at);
    }

    #[test]
    fn test_display_name_or_username() {
        let mut user = create_test_user();
        assert_eq!(user.display_name_or_username(), "testuser");

        user.display_name = Some("Test User".to_string());
        assert_eq!(user.display_name_or_username(), "Test User");
    }

    #[test]
    fn test_matches_prefix() {
        let mut user = create_test_user();
        user.display_name = Some("Alice Smith".to_string());

        assert!(user.matches_prefix("TEST"));
        assert!(user.matches_prefix("ali"));
        assert!(!user.matches_prefix("smith"));
        assert!(!user.matches_prefix("bob"));
    }

    #[test]
    fn test_password_hash_not_serialized() {
        let json = serde_json::to_value(create_test_user()).unwrap();
        assert!(json.get("password_hash").is_none());
        assert_eq!(json["username"], "testuser");
    }
}
