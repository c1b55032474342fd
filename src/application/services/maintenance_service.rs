//! Maintenance Service
//!
//! Work run by the scheduled `Cleanup` and `DueDateReminders` jobs.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};

use super::access;
use super::notification_service::{NotificationDraft, NotificationService};
use crate::application::storage::FileStorage;
use crate::config::JobSettings;
use crate::domain::{EntityType, NotificationKind, Repositories};
use crate::shared::error::AppError;

/// Rows removed by one cleanup run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupReport {
    pub attachments: u64,
    pub files_missing: u64,
    pub comments: u64,
    pub subtasks: u64,
    pub tasks: u64,
    pub projects: u64,
    pub teams: u64,
    pub notifications: u64,
    pub sessions: u64,
}

#[async_trait]
pub trait MaintenanceService: Send + Sync {
    /// Hard-delete records past their retention.
    async fn cleanup(&self) -> Result<CleanupReport, AppError>;

    /// Notify assignees of tasks due soon. Returns the number of tasks reminded.
    async fn send_due_reminders(&self) -> Result<usize, AppError>;
}

pub struct MaintenanceServiceImpl {
    repos: Repositories,
    storage: Arc<dyn FileStorage>,
    notifications: Arc<dyn NotificationService>,
    settings: JobSettings,
}

impl MaintenanceServiceImpl {
    pub fn new(
        repos: Repositories,
        storage: Arc<dyn FileStorage>,
        notifications: Arc<dyn NotificationService>,
        settings: JobSettings,
    ) -> Self {
        Self {
            repos,
            storage,
            notifications,
            settings,
        }
    }
}

#[async_trait]
impl MaintenanceService for MaintenanceServiceImpl {
    async fn cleanup(&self) -> Result<CleanupReport, AppError> {
        let now = Utc::now();
        let cutoff = now - Duration::days(self.settings.soft_delete_retention_days);
        let mut report = CleanupReport::default();

        // Attachments go first: their purge also covers deleted parents,
        // which must still exist to be found
        let purged = self.repos.attachments.purge_deleted(cutoff).await?;
        report.attachments = purged.len() as u64;
        for attachment in purged {
            if let Err(e) = self.storage.delete(&attachment.storage_key).await {
                report.files_missing += 1;
                tracing::warn!(
                    attachment_id = attachment.id,
                    storage_key = %attachment.storage_key,
                    error = %e,
                    "Failed to delete stored file"
                );
            }
        }

        report.comments = self.repos.comments.purge_deleted(cutoff).await?;
        report.subtasks = self.repos.subtasks.purge_deleted(cutoff).await?;
        report.tasks = self.repos.tasks.purge_deleted(cutoff).await?;
        report.projects = self.repos.projects.purge_deleted(cutoff).await?;
        report.teams = self.repos.teams.purge_deleted(cutoff).await?;

        let read_cutoff = now - Duration::days(self.settings.notification_retention_days);
        report.notifications = self.repos.notifications.purge_read(read_cutoff).await?;
        report.sessions = self.repos.sessions.delete_stale(now).await?;

        Ok(report)
    }

    async fn send_due_reminders(&self) -> Result<usize, AppError> {
        let now = Utc::now();
        let until = now + Duration::hours(self.settings.reminder_window_hours);
        let tasks = self.repos.tasks.due_for_reminder(now, until).await?;

        let mut reminded = 0;
        for task in &tasks {
            let Some(due) = task.due_date else { continue };
            let recipients = access::project_viewers(&self.repos, task.project_id, &task.assignee_ids).await?;
            let draft = NotificationDraft {
                kind: NotificationKind::TaskDueSoon,
                actor_id: None,
                title: format!("\"{}\" is due soon", task.title),
                body: Some(format!("Due {}", due.format("%Y-%m-%d %H:%M UTC"))),
                entity_type: EntityType::Task,
                entity_id: task.id,
            };
            if !recipients.is_empty() {
                self.notifications.notify(&recipients, draft).await?;
            }
            // Per task, so a retried run never reminds the same task twice
            self.repos.tasks.mark_reminded(&[task.id], now).await?;
            reminded += 1;
        }
        Ok(reminded)
    }
}
