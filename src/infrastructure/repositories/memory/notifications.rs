//! In-memory notifications and activity log.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::MemoryStore;
use crate::domain::{Activity, ActivityRepository, Notification, NotificationRepository};
use crate::shared::error::AppError;
use crate::shared::pagination::{Page, PageRequest};

#[derive(Clone)]
pub struct MemoryNotificationRepository {
    store: Arc<MemoryStore>,
}

impl MemoryNotificationRepository {
    pub fn new(store: Arc<MemoryStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl NotificationRepository for MemoryNotificationRepository {
    async fn insert_if_absent(&self, notification: &Notification) -> Result<bool, AppError> {
        let mut notifications = self.store.notifications.write();
        if notifications.contains_key(&notification.id) {
            return Ok(false);
        }
        notifications.insert(notification.id, notification.clone());
        Ok(true)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Notification>, AppError> {
        Ok(self.store.notifications.read().get(&id).cloned())
    }

    async fn list_for_user(
        &self,
        user_id: i64,
        unread_only: bool,
        page: PageRequest,
    ) -> Result<Page<Notification>, AppError> {
        let mut mine: Vec<Notification> = self
            .store
            .notifications
            .read()
            .values()
            .filter(|n| n.user_id == user_id && (!unread_only || !n.is_read()))
            .cloned()
            .collect();
        mine.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(Page::from_vec(mine, page))
    }

    async fn unread_count(&self, user_id: i64) -> Result<i64, AppError> {
        Ok(self
            .store
            .notifications
            .read()
            .values()
            .filter(|n| n.user_id == user_id && !n.is_read())
            .count() as i64)
    }

    async fn mark_read(&self, id: i64, at: DateTime<Utc>) -> Result<(), AppError> {
        if let Some(notification) = self.store.notifications.write().get_mut(&id) {
            notification.read_at.get_or_insert(at);
        }
        Ok(())
    }

    async fn mark_all_read(&self, user_id: i64, at: DateTime<Utc>) -> Result<u64, AppError> {
        let mut marked = 0;
        for notification in self.store.notifications.write().values_mut() {
            if notification.user_id == user_id && notification.read_at.is_none() {
                notification.read_at = Some(at);
                marked += 1;
            }
        }
        Ok(marked)
    }

    async fn delete(&self, id: i64) -> Result<(), AppError> {
        self.store.notifications.write().remove(&id);
        Ok(())
    }

    async fn purge_read(&self, before: DateTime<Utc>) -> Result<u64, AppError> {
        let mut notifications = self.store.notifications.write();
        let count = notifications.len();
        notifications.retain(|_, n| !n.read_at.map(|at| at < before).unwrap_or(false));
        Ok((count - notifications.len()) as u64)
    }
}

#[derive(Clone)]
pub struct MemoryActivityRepository {
    store: Arc<MemoryStore>,
}

impl MemoryActivityRepository {
    pub fn new(store: Arc<MemoryStore>) -> Self {
        Self { store }
    }

    fn newest_first(&self, keep: impl Fn(&Activity) -> bool, page: PageRequest) -> Page<Activity> {
        let mut selected: Vec<Activity> = self
            .store
            .activities
            .read()
            .iter()
            .filter(|a| keep(*a))
            .cloned()
            .collect();
        selected.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Page::from_vec(selected, page)
    }
}

#[async_trait]
impl ActivityRepository for MemoryActivityRepository {
    async fn append(&self, activity: &Activity) -> Result<(), AppError> {
        self.store.activities.write().push(activity.clone());
        Ok(())
    }

    async fn list_for_project(
        &self,
        project_id: i64,
        page: PageRequest,
    ) -> Result<Page<Activity>, AppError> {
        Ok(self.newest_first(|a| a.project_id == Some(project_id), page))
    }

    async fn list_for_task(
        &self,
        task_id: i64,
        page: PageRequest,
    ) -> Result<Page<Activity>, AppError> {
        Ok(self.newest_first(|a| a.task_id == Some(task_id), page))
    }
}
