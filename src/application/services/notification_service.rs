//! Notification Service
//!
//! Notifications are never written inline by request handlers. `notify`
//! assigns ids and enqueues one `DeliverNotification` job per recipient; the
//! worker calls `deliver`, which persists idempotently and pushes the event.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;

use crate::application::jobs::{Job, JobEnvelope, JobQueue};
use crate::application::realtime::{EventBroadcaster, RealtimeEvent, Room};
use crate::domain::{EntityType, Notification, NotificationKind, Repositories};
use crate::shared::error::AppError;
use crate::shared::pagination::{Page, PageRequest};
use crate::shared::snowflake::SnowflakeGenerator;

/// What to tell the recipients.
#[derive(Debug, Clone)]
pub struct NotificationDraft {
    pub kind: NotificationKind,
    /// `None` for system notifications (reminders)
    pub actor_id: Option<i64>,
    pub title: String,
    pub body: Option<String>,
    pub entity_type: EntityType,
    pub entity_id: i64,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NotificationService: Send + Sync {
    /// Enqueue delivery to each recipient except the actor. Returns the number enqueued.
    async fn notify(&self, recipients: &[i64], draft: NotificationDraft) -> Result<usize, AppError>;

    /// Persist (insert-if-absent) and push. Returns `false` for a redelivery.
    async fn deliver(&self, notification: &Notification) -> Result<bool, AppError>;

    async fn list(
        &self,
        user_id: i64,
        unread_only: bool,
        page: PageRequest,
    ) -> Result<Page<Notification>, AppError>;

    async fn unread_count(&self, user_id: i64) -> Result<i64, AppError>;

    async fn mark_read(&self, user_id: i64, notification_id: i64) -> Result<Notification, AppError>;

    async fn mark_all_read(&self, user_id: i64) -> Result<u64, AppError>;

    async fn delete(&self, user_id: i64, notification_id: i64) -> Result<(), AppError>;
}

pub struct NotificationServiceImpl {
    repos: Repositories,
    id_generator: Arc<SnowflakeGenerator>,
    queue: Arc<dyn JobQueue>,
    events: Arc<dyn EventBroadcaster>,
    max_attempts: u32,
}

impl NotificationServiceImpl {
    pub fn new(
        repos: Repositories,
        id_generator: Arc<SnowflakeGenerator>,
        queue: Arc<dyn JobQueue>,
        events: Arc<dyn EventBroadcaster>,
        max_attempts: u32,
    ) -> Self {
        Self {
            repos,
            id_generator,
            queue,
            events,
            max_attempts,
        }
    }

    /// Load a notification owned by `user_id`. Someone else's is reported as missing.
    async fn owned(&self, user_id: i64, notification_id: i64) -> Result<Notification, AppError> {
        self.repos
            .notifications
            .find_by_id(notification_id)
            .await?
            .filter(|n| n.user_id == user_id)
            .ok_or_else(|| AppError::NotFound("Notification not found".into()))
    }
}

#[async_trait]
impl NotificationService for NotificationServiceImpl {
    async fn notify(&self, recipients: &[i64], draft: NotificationDraft) -> Result<usize, AppError> {
        let mut seen = HashSet::new();
        let now = Utc::now();
        let mut enqueued = 0;

        for &user_id in recipients {
            if Some(user_id) == draft.actor_id || !seen.insert(user_id) {
                continue;
            }

            let notification = Notification {
                id: self.id_generator.generate(),
                user_id,
                actor_id: draft.actor_id,
                kind: draft.kind,
                title: draft.title.clone(),
                body: draft.body.clone(),
                entity_type: draft.entity_type,
                entity_id: draft.entity_id,
                read_at: None,
                created_at: now,
            };
            let envelope = JobEnvelope::new(Job::DeliverNotification { notification }, self.max_attempts);
            self.queue
                .enqueue(&envelope)
                .await
                .map_err(|e| AppError::Internal(format!("Failed to enqueue notification: {}", e)))?;
            enqueued += 1;
        }

        tracing::debug!(kind = %draft.kind, enqueued, "Notifications enqueued");
        Ok(enqueued)
    }

    async fn deliver(&self, notification: &Notification) -> Result<bool, AppError> {
        let inserted = self.repos.notifications.insert_if_absent(notification).await?;
        if inserted {
            self.events.publish(
                &[Room::User(notification.user_id)],
                RealtimeEvent::NotificationCreated(notification.clone().into()),
            );
        } else {
            tracing::debug!(notification_id = notification.id, "Notification already delivered");
        }
        Ok(inserted)
    }

    async fn list(
        &self,
        user_id: i64,
        unread_only: bool,
        page: PageRequest,
    ) -> Result<Page<Notification>, AppError> {
        self.repos
            .notifications
            .list_for_user(user_id, unread_only, page)
            .await
    }

    async fn unread_count(&self, user_id: i64) -> Result<i64, AppError> {
        self.repos.notifications.unread_count(user_id).await
    }

    async fn mark_read(&self, user_id: i64, notification_id: i64) -> Result<Notification, AppError> {
        let mut notification = self.owned(user_id, notification_id).await?;
        if notification.read_at.is_none() {
            let now = Utc::now();
            self.repos.notifications.mark_read(notification_id, now).await?;
            notification.read_at = Some(now);
        }
        Ok(notification)
    }

    async fn mark_all_read(&self, user_id: i64) -> Result<u64, AppError> {
        self.repos.notifications.mark_all_read(user_id, Utc::now()).await
    }

    async fn delete(&self, user_id: i64, notification_id: i64) -> Result<(), AppError> {
        self.owned(user_id, notification_id).await?;
        self.repos.notifications.delete(notification_id).await
    }
}
