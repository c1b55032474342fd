//! In-memory users and sessions.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::MemoryStore;
use crate::domain::{Session, SessionRepository, User, UserRepository};
use crate::shared::error::AppError;
use crate::shared::pagination::{Page, PageRequest};

#[derive(Clone)]
pub struct MemoryUserRepository {
    store: Arc<MemoryStore>,
}

impl MemoryUserRepository {
    pub fn new(store: Arc<MemoryStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl UserRepository for MemoryUserRepository {
    async fn find_by_id(&self, id: i64) -> Result<Option<User>, AppError> {
        Ok(self.store.users.read().get(&id).cloned())
    }

    async fn find_by_ids(&self, ids: &[i64]) -> Result<Vec<User>, AppError> {
        let users = self.store.users.read();
        let mut found: Vec<User> = ids.iter().filter_map(|id| users.get(id).cloned()).collect();
        found.sort_by_key(|u| u.id);
        found.dedup_by_key(|u| u.id);
        Ok(found)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let users = self.store.users.read();
        Ok(users
            .values()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, AppError> {
        let username = username.to_lowercase();
        let users = self.store.users.read();
        Ok(users
            .values()
            .find(|u| u.username.to_lowercase() == username)
            .cloned())
    }

    async fn create(&self, user: &User) -> Result<User, AppError> {
        let mut users = self.store.users.write();
        let username = user.username.to_lowercase();
        let taken = users.values().any(|u| {
            u.id == user.id
                || u.email.eq_ignore_ascii_case(&user.email)
                || u.username.to_lowercase() == username
        });
        if taken {
            return Err(AppError::Conflict(
                "User with this email or username already exists".into(),
            ));
        }
        users.insert(user.id, user.clone());
        Ok(user.clone())
    }

    async fn update(&self, user: &User) -> Result<User, AppError> {
        let mut users = self.store.users.write();
        let stored = users
            .get_mut(&user.id)
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", user.id)))?;
        stored.display_name = user.display_name.clone();
        stored.avatar_url = user.avatar_url.clone();
        stored.bio = user.bio.clone();
        stored.password_hash = user.password_hash.clone();
        stored.is_active = user.is_active;
        stored.updated_at = user.updated_at;
        Ok(stored.clone())
    }

    async fn search(&self, query: &str, page: PageRequest) -> Result<Page<User>, AppError> {
        let users = self.store.users.read();
        let mut matches: Vec<User> = users
            .values()
            .filter(|u| u.is_active && u.matches_prefix(query))
            .cloned()
            .collect();
        matches.sort_by(|a, b| a.username.cmp(&b.username));
        Ok(Page::from_vec(matches, page))
    }

    async fn touch_last_seen(&self, id: i64, at: DateTime<Utc>) -> Result<(), AppError> {
        if let Some(user) = self.store.users.write().get_mut(&id) {
            user.last_seen_at = Some(at);
        }
        Ok(())
    }
}

#[derive(Clone)]
pub struct MemorySessionRepository {
    store: Arc<MemoryStore>,
}

impl MemorySessionRepository {
    pub fn new(store: Arc<MemoryStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl SessionRepository for MemorySessionRepository {
    async fn create(&self, session: &Session) -> Result<Session, AppError> {
        let mut sessions = self.store.sessions.write();
        if sessions
            .values()
            .any(|s| s.refresh_token_hash == session.refresh_token_hash)
        {
            return Err(AppError::Conflict("Session token collision".into()));
        }
        sessions.insert(session.id, session.clone());
        Ok(session.clone())
    }

    async fn find_by_token_hash(&self, token_hash: &str) -> Result<Option<Session>, AppError> {
        let sessions = self.store.sessions.read();
        Ok(sessions
            .values()
            .find(|s| s.refresh_token_hash == token_hash)
            .cloned())
    }

    async fn rotate(
        &self,
        id: Uuid,
        new_token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), AppError> {
        let mut sessions = self.store.sessions.write();
        match sessions.get_mut(&id) {
            Some(session) if session.revoked_at.is_none() => {
                session.refresh_token_hash = new_token_hash.to_string();
                session.expires_at = expires_at;
                session.last_used_at = Utc::now();
                Ok(())
            }
            _ => Err(AppError::NotFound(format!("Session {} not found", id))),
        }
    }

    async fn revoke(&self, id: Uuid) -> Result<(), AppError> {
        if let Some(session) = self.store.sessions.write().get_mut(&id) {
            session.revoked_at.get_or_insert_with(Utc::now);
        }
        Ok(())
    }

    async fn revoke_all_for_user(&self, user_id: i64) -> Result<u64, AppError> {
        let now = Utc::now();
        let mut revoked = 0;
        for session in self.store.sessions.write().values_mut() {
            if session.user_id == user_id && session.revoked_at.is_none() {
                session.revoked_at = Some(now);
                revoked += 1;
            }
        }
        Ok(revoked)
    }

    async fn delete_stale(&self, revoked_before: DateTime<Utc>) -> Result<u64, AppError> {
        let now = Utc::now();
        let mut sessions = self.store.sessions.write();
        let before = sessions.len();
        sessions.retain(|_, s| {
            let expired = s.expires_at < now;
            let revoked = s.revoked_at.map(|at| at < revoked_before).unwrap_or(false);
            !(expired || revoked)
        });
        Ok((before - sessions.len()) as u64)
    }
}
