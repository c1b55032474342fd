//! Authentication Service
//!
//! Handles registration, login, JWT issuing, and refresh-token sessions.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;

use crate::config::JwtSettings;
use crate::domain::{Repositories, Session, User};
use crate::shared::error::AppError;
use crate::shared::snowflake::SnowflakeGenerator;
use crate::shared::validation::required_text;

/// Authentication service trait for dependency injection
#[async_trait]
pub trait AuthService: Send + Sync {
    /// Register a new user and open a session
    async fn register(
        &self,
        input: RegisterInput,
        user_agent: Option<String>,
    ) -> Result<(User, AuthTokens), AuthError>;

    /// Authenticate user with credentials
    async fn login(
        &self,
        email: &str,
        password: &str,
        user_agent: Option<String>,
    ) -> Result<(User, AuthTokens), AuthError>;

    /// Exchange a refresh token for a new token pair (the old one stops working)
    async fn refresh(&self, refresh_token: &str) -> Result<AuthTokens, AuthError>;

    /// Revoke the session behind one refresh token
    async fn logout(&self, refresh_token: &str) -> Result<(), AuthError>;

    /// Revoke every session of the user. Returns how many were revoked.
    async fn logout_all(&self, user_id: i64) -> Result<u64, AuthError>;

    /// Change password and revoke all sessions
    async fn change_password(
        &self,
        user_id: i64,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), AuthError>;

    /// Validate access token and return the active user behind it
    async fn authenticate_token(&self, access_token: &str) -> Result<User, AuthError>;
}

/// Registration input
#[derive(Debug, Clone)]
pub struct RegisterInput {
    pub username: String,
    pub email: String,
    pub password: String,
    pub display_name: Option<String>,
}

/// Authentication tokens response
#[derive(Debug, Clone, Serialize)]
pub struct AuthTokens {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: i64,
    pub token_type: String,
}

/// JWT claims structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: String,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Issued at time (Unix timestamp)
    pub iat: i64,
    /// JWT ID
    pub jti: String,
}

/// Authentication errors
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Account is deactivated")]
    AccountDisabled,

    #[error("Token expired")]
    TokenExpired,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Session not found or expired")]
    SessionNotFound,

    #[error("Email already exists")]
    EmailExists,

    #[error("Username already exists")]
    UsernameExists,

    #[error("Current password is incorrect")]
    WrongPassword,

    #[error(transparent)]
    Repository(#[from] AppError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<AuthError> for AppError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::InvalidCredentials
            | AuthError::AccountDisabled
            | AuthError::TokenExpired
            | AuthError::InvalidToken
            | AuthError::SessionNotFound => AppError::Unauthorized(e.to_string()),
            AuthError::EmailExists | AuthError::UsernameExists => AppError::Conflict(e.to_string()),
            AuthError::WrongPassword => AppError::invalid_field("current_password", e.to_string()),
            AuthError::Repository(e) => e,
            AuthError::Internal(msg) => AppError::Internal(msg),
        }
    }
}

/// Decode and validate an access token, returning its claims.
pub fn decode_access_token(secret: &str, token: &str) -> Result<Claims, AuthError> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| match e.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
        _ => AuthError::InvalidToken,
    })?;

    Ok(token_data.claims)
}

/// Hash a password using Argon2id
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AuthError::Internal(format!("Password hashing failed: {}", e)))
}

/// Verify a password against its hash
pub fn verify_password(password: &str, hash: &str) -> Result<bool, AuthError> {
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|e| AuthError::Internal(format!("Invalid password hash: {}", e)))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

/// Hash refresh token for storage
fn hash_refresh_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// AuthService implementation
pub struct AuthServiceImpl {
    repos: Repositories,
    id_generator: Arc<SnowflakeGenerator>,
    jwt_settings: JwtSettings,
}

impl AuthServiceImpl {
    /// Create a new AuthServiceImpl
    pub fn new(
        repos: Repositories,
        id_generator: Arc<SnowflakeGenerator>,
        jwt_settings: JwtSettings,
    ) -> Self {
        Self {
            repos,
            id_generator,
            jwt_settings,
        }
    }

    /// Generate access and refresh tokens
    fn generate_tokens(&self, user_id: i64) -> Result<AuthTokens, AuthError> {
        let now = Utc::now();
        let access_expiry = now + Duration::minutes(self.jwt_settings.access_token_expiry_minutes);

        let access_claims = Claims {
            sub: user_id.to_string(),
            exp: access_expiry.timestamp(),
            iat: now.timestamp(),
            jti: uuid::Uuid::new_v4().to_string(),
        };

        let access_token = encode(
            &Header::default(),
            &access_claims,
            &EncodingKey::from_secret(self.jwt_settings.secret.as_bytes()),
        )
        .map_err(|e| AuthError::Internal(format!("Token generation failed: {}", e)))?;

        // Opaque refresh token; only its hash is stored
        let refresh_token = format!("{}.{}", uuid::Uuid::new_v4(), uuid::Uuid::new_v4());

        Ok(AuthTokens {
            access_token,
            refresh_token,
            expires_in: self.jwt_settings.access_token_expiry_minutes * 60,
            token_type: "Bearer".to_string(),
        })
    }

    fn refresh_expiry(&self) -> chrono::DateTime<Utc> {
        Utc::now() + Duration::days(self.jwt_settings.refresh_token_expiry_days)
    }

    /// Issue tokens and persist the session backing the refresh token.
    async fn open_session(
        &self,
        user_id: i64,
        user_agent: Option<String>,
    ) -> Result<AuthTokens, AuthError> {
        let tokens = self.generate_tokens(user_id)?;
        let session = Session::new(
            user_id,
            hash_refresh_token(&tokens.refresh_token),
            user_agent,
            self.refresh_expiry(),
        );
        self.repos.sessions.create(&session).await?;
        Ok(tokens)
    }

    async fn active_user(&self, user_id: i64) -> Result<User, AuthError> {
        let user = self
            .repos
            .users
            .find_by_id(user_id)
            .await?
            .ok_or(AuthError::InvalidToken)?;
        if !user.is_active {
            return Err(AuthError::AccountDisabled);
        }
        Ok(user)
    }
}

#[async_trait]
impl AuthService for AuthServiceImpl {
    async fn register(
        &self,
        input: RegisterInput,
        user_agent: Option<String>,
    ) -> Result<(User, AuthTokens), AuthError> {
        let email = input.email.trim().to_lowercase();
        let username = required_text(&input.username, "username")?;

        if self.repos.users.find_by_email(&email).await?.is_some() {
            return Err(AuthError::EmailExists);
        }
        if self.repos.users.find_by_username(&username).await?.is_some() {
            return Err(AuthError::UsernameExists);
        }

        let password_hash = hash_password(&input.password)?;
        let mut user = User::new(self.id_generator.generate(), username, email, password_hash);
        user.display_name = input
            .display_name
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty());

        let user = self.repos.users.create(&user).await?;
        let tokens = self.open_session(user.id, user_agent).await?;

        tracing::info!(user_id = user.id, username = %user.username, "User registered");
        Ok((user, tokens))
    }

    async fn login(
        &self,
        email: &str,
        password: &str,
        user_agent: Option<String>,
    ) -> Result<(User, AuthTokens), AuthError> {
        let user = self
            .repos
            .users
            .find_by_email(&email.trim().to_lowercase())
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        if !verify_password(password, &user.password_hash)? {
            tracing::debug!(user_id = user.id, "Login rejected: wrong password");
            return Err(AuthError::InvalidCredentials);
        }
        if !user.is_active {
            return Err(AuthError::AccountDisabled);
        }

        let tokens = self.open_session(user.id, user_agent).await?;
        tracing::info!(user_id = user.id, "User logged in");
        Ok((user, tokens))
    }

    async fn refresh(&self, refresh_token: &str) -> Result<AuthTokens, AuthError> {
        let session = self
            .repos
            .sessions
            .find_by_token_hash(&hash_refresh_token(refresh_token))
            .await?
            .ok_or(AuthError::SessionNotFound)?;

        if !session.is_active() {
            return Err(AuthError::SessionNotFound);
        }
        self.active_user(session.user_id).await?;

        // Token rotation: the presented refresh token is replaced
        let tokens = self.generate_tokens(session.user_id)?;
        self.repos
            .sessions
            .rotate(
                session.id,
                &hash_refresh_token(&tokens.refresh_token),
                self.refresh_expiry(),
            )
            .await?;

        Ok(tokens)
    }

    async fn logout(&self, refresh_token: &str) -> Result<(), AuthError> {
        let session = self
            .repos
            .sessions
            .find_by_token_hash(&hash_refresh_token(refresh_token))
            .await?
            .ok_or(AuthError::SessionNotFound)?;

        self.repos.sessions.revoke(session.id).await?;
        tracing::info!(user_id = session.user_id, session_id = %session.id, "Session revoked");
        Ok(())
    }

    async fn logout_all(&self, user_id: i64) -> Result<u64, AuthError> {
        let revoked = self.repos.sessions.revoke_all_for_user(user_id).await?;
        tracing::info!(user_id, revoked, "All sessions revoked");
        Ok(revoked)
    }

    async fn change_password(
        &self,
        user_id: i64,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), AuthError> {
        let mut user = self.active_user(user_id).await?;

        if !verify_password(current_password, &user.password_hash)? {
            return Err(AuthError::WrongPassword);
        }

        user.password_hash = hash_password(new_password)?;
        user.updated_at = Utc::now();
        self.repos.users.update(&user).await?;
        self.repos.sessions.revoke_all_for_user(user_id).await?;

        tracing::info!(user_id, "Password changed, sessions revoked");
        Ok(())
    }

    async fn authenticate_token(&self, access_token: &str) -> Result<User, AuthError> {
        let claims = decode_access_token(&self.jwt_settings.secret, access_token)?;
        let user_id = claims
            .sub
            .parse::<i64>()
            .map_err(|_| AuthError::InvalidToken)?;
        self.active_user(user_id).await
    }
}
