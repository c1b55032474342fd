//! Attachment Service
//!
//! Task files: metadata in the repository, bytes in [`FileStorage`].

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;
use sha2::{Digest, Sha256};

use super::access::{self, AccessError, TaskScope};
use super::activity_service::{ActivityRecorder, NewActivity};
use crate::application::realtime::{DeletedRef, EventBroadcaster, RealtimeEvent};
use crate::application::storage::{FileStorage, StorageError};
use crate::config::UploadSettings;
use crate::domain::services::{AccessLevel, AccessPolicy};
use crate::domain::{sanitize_filename, ActivityAction, Attachment, EntityType, Repositories};
use crate::shared::error::AppError;
use crate::shared::snowflake::SnowflakeGenerator;

/// One uploaded file as read from the multipart body.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub filename: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

#[async_trait]
pub trait AttachmentService: Send + Sync {
    async fn upload(&self, user_id: i64, task_id: i64, file: UploadedFile) -> Result<Attachment, AttachmentError>;

    async fn list(&self, user_id: i64, task_id: i64) -> Result<Vec<Attachment>, AttachmentError>;

    /// Metadata plus content
    async fn download(&self, user_id: i64, attachment_id: i64) -> Result<(Attachment, Vec<u8>), AttachmentError>;

    /// Soft delete; bytes are removed by the cleanup job
    async fn delete(&self, user_id: i64, attachment_id: i64) -> Result<(), AttachmentError>;
}

#[derive(Debug, thiserror::Error)]
pub enum AttachmentError {
    #[error(transparent)]
    Access(#[from] AccessError),

    #[error("File is empty")]
    EmptyFile,

    #[error("File exceeds the maximum size of {0} bytes")]
    TooLarge(usize),

    #[error("Content type {0} is not allowed")]
    UnsupportedType(String),

    #[error("Only the uploader or a project manager can delete an attachment")]
    CannotDelete,

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Repository(#[from] AppError),
}

impl From<AttachmentError> for AppError {
    fn from(e: AttachmentError) -> Self {
        match e {
            AttachmentError::Access(e) => e.into(),
            AttachmentError::EmptyFile | AttachmentError::UnsupportedType(_) => {
                AppError::invalid_field("file", e.to_string())
            }
            AttachmentError::TooLarge(_) => AppError::PayloadTooLarge(e.to_string()),
            AttachmentError::CannotDelete => AppError::Forbidden(e.to_string()),
            AttachmentError::Storage(StorageError::NotFound(key)) => {
                tracing::error!(storage_key = %key, "Attachment content missing from storage");
                AppError::NotFound("Attachment content not found".into())
            }
            AttachmentError::Storage(e) => AppError::Internal(e.to_string()),
            AttachmentError::Repository(e) => e,
        }
    }
}

/// SHA-256 of `bytes` as lowercase hex.
fn checksum(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

pub struct AttachmentServiceImpl {
    repos: Repositories,
    storage: Arc<dyn FileStorage>,
    id_generator: Arc<SnowflakeGenerator>,
    events: Arc<dyn EventBroadcaster>,
    activity: ActivityRecorder,
    settings: UploadSettings,
}

impl AttachmentServiceImpl {
    pub fn new(
        repos: Repositories,
        storage: Arc<dyn FileStorage>,
        id_generator: Arc<SnowflakeGenerator>,
        events: Arc<dyn EventBroadcaster>,
        activity: ActivityRecorder,
        settings: UploadSettings,
    ) -> Self {
        Self {
            repos,
            storage,
            id_generator,
            events,
            activity,
            settings,
        }
    }

    async fn load(&self, user_id: i64, attachment_id: i64) -> Result<(Attachment, TaskScope), AttachmentError> {
        let attachment = self
            .repos
            .attachments
            .find_by_id(attachment_id)
            .await?
            .ok_or(AccessError::NotFound("Attachment"))?;
        let scope = access::task_scope(&self.repos, attachment.task_id, user_id, AccessLevel::Viewer)
            .await
            .map_err(|e| match e {
                AccessError::NotFound(_) => AccessError::NotFound("Attachment"),
                other => other,
            })?;
        Ok((attachment, scope))
    }
}

#[async_trait]
impl AttachmentService for AttachmentServiceImpl {
    async fn upload(&self, user_id: i64, task_id: i64, file: UploadedFile) -> Result<Attachment, AttachmentError> {
        let scope = access::task_scope(&self.repos, task_id, user_id, AccessLevel::Contributor).await?;

        if file.bytes.is_empty() {
            return Err(AttachmentError::EmptyFile);
        }
        if file.bytes.len() > self.settings.max_file_size {
            return Err(AttachmentError::TooLarge(self.settings.max_file_size));
        }
        if !self.settings.is_allowed(&file.content_type) {
            return Err(AttachmentError::UnsupportedType(file.content_type));
        }

        let storage_key = uuid::Uuid::new_v4().to_string();
        self.storage.put(&storage_key, &file.bytes).await?;

        let attachment = Attachment {
            id: self.id_generator.generate(),
            task_id,
            uploaded_by: user_id,
            filename: sanitize_filename(&file.filename),
            content_type: file.content_type,
            size: file.bytes.len() as i64,
            storage_key,
            checksum: checksum(&file.bytes),
            created_at: Utc::now(),
            deleted_at: None,
        };
        let attachment = match self.repos.attachments.create(&attachment).await {
            Ok(attachment) => attachment,
            Err(e) => {
                // Do not leave orphaned bytes behind
                if let Err(cleanup) = self.storage.delete(&attachment.storage_key).await {
                    tracing::warn!(storage_key = %attachment.storage_key, error = %cleanup, "Failed to remove orphaned upload");
                }
                return Err(e.into());
            }
        };

        self.activity
            .record(
                NewActivity::new(user_id, EntityType::Attachment, attachment.id, ActivityAction::Created)
                    .in_task(&scope)
                    .with_metadata(json!({ "filename": attachment.filename, "size": attachment.size })),
            )
            .await;
        self.events
            .publish(&scope.rooms(), RealtimeEvent::AttachmentAdded(attachment.clone().into()));

        tracing::info!(
            attachment_id = attachment.id,
            task_id,
            size = attachment.size,
            content_type = %attachment.content_type,
            "Attachment uploaded"
        );
        Ok(attachment)
    }

    async fn list(&self, user_id: i64, task_id: i64) -> Result<Vec<Attachment>, AttachmentError> {
        access::task_scope(&self.repos, task_id, user_id, AccessLevel::Viewer).await?;
        Ok(self.repos.attachments.list_for_task(task_id).await?)
    }

    async fn download(&self, user_id: i64, attachment_id: i64) -> Result<(Attachment, Vec<u8>), AttachmentError> {
        let (attachment, _) = self.load(user_id, attachment_id).await?;
        let bytes = self.storage.get(&attachment.storage_key).await?;
        Ok((attachment, bytes))
    }

    async fn delete(&self, user_id: i64, attachment_id: i64) -> Result<(), AttachmentError> {
        let (attachment, scope) = self.load(user_id, attachment_id).await?;
        if !AccessPolicy::can_delete_attachment(&attachment, user_id, scope.scope.level) {
            return Err(AttachmentError::CannotDelete);
        }

        self.repos.attachments.soft_delete(attachment_id, Utc::now()).await?;

        self.activity
            .record(
                NewActivity::new(user_id, EntityType::Attachment, attachment_id, ActivityAction::Deleted)
                    .in_task(&scope)
                    .with_metadata(json!({ "filename": attachment.filename })),
            )
            .await;
        self.events.publish(
            &scope.rooms(),
            RealtimeEvent::AttachmentDeleted(DeletedRef::new(attachment_id, Some(attachment.task_id))),
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::realtime::MockEventBroadcaster;
    use crate::config::Settings;
    use crate::domain::{Project, ProjectMember, ProjectRole, Task, Team, TeamMember, TeamRole};
    use crate::infrastructure::repositories::memory;
    use crate::infrastructure::storage::LocalFileStorage;

    struct Fixture {
        service: AttachmentServiceImpl,
        task: Task,
        _dir: tempfile::TempDir,
    }

    /// Owner 1 manages; 2 and 3 contribute.
    async fn fixture() -> Fixture {
        let repos = memory::repositories();
        repos.teams.create(&Team::new(1, "Core".into(), None, 1)).await.unwrap();
        for user_id in [2, 3] {
            repos.teams.add_member(1, &TeamMember::new(user_id, TeamRole::Member)).await.unwrap();
        }
        repos.projects.create(&Project::new(10, 1, "Roadmap".into(), 1)).await.unwrap();
        for user_id in [2, 3] {
            repos
                .projects
                .add_member(10, &ProjectMember::new(user_id, ProjectRole::Contributor))
                .await
                .unwrap();
        }
        let task = repos.tasks.create(&Task::new(20, 10, "Task".into(), 1)).await.unwrap();

        let dir = tempfile::tempdir().unwrap();
        let mut settings = Settings::for_tests("0123456789abcdef0123456789abcdef")
            .unwrap()
            .uploads;
        settings.max_file_size = 16;
        settings.allowed_content_types = vec!["text/plain".into(), "image/*".into()];

        let ids = Arc::new(SnowflakeGenerator::default());
        let mut events = MockEventBroadcaster::new();
        events.expect_publish().return_const(());
        let service = AttachmentServiceImpl::new(
            repos.clone(),
            Arc::new(LocalFileStorage::new(dir.path())),
            ids.clone(),
            Arc::new(events),
            ActivityRecorder::new(repos.activities.clone(), ids),
            settings,
        );

        Fixture {
            service,
            task,
            _dir: dir,
        }
    }

    fn file(name: &str, content_type: &str, bytes: &[u8]) -> UploadedFile {
        UploadedFile {
            filename: name.into(),
            content_type: content_type.into(),
            bytes: bytes.to_vec(),
        }
    }

    #[test]
    fn test_checksum_is_sha256_hex() {
        assert_eq!(
            checksum(b"hello"),
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
    }

    #[tokio::test]
    async fn test_upload_download_roundtrip() {
        let f = fixture().await;
        let attachment = f
            .service
            .upload(2, f.task.id, file("../../etc/notes.txt", "text/plain", b"hello"))
            .await
            .unwrap();
        assert_eq!(attachment.filename, "notes.txt");
        assert_eq!(attachment.size, 5);

        let (meta, bytes) = f.service.download(3, attachment.id).await.unwrap();
        assert_eq!(meta.id, attachment.id);
        assert_eq!(bytes, b"hello");
        assert_eq!(f.service.list(1, f.task.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_upload_limits() {
        let f = fixture().await;
        let result = f.service.upload(2, f.task.id, file("big.txt", "text/plain", &[b'x'; 17])).await;
        assert!(matches!(result, Err(AttachmentError::TooLarge(16))));

        let result = f.service.upload(2, f.task.id, file("a.exe", "application/x-msdownload", b"MZ")).await;
        assert!(matches!(result, Err(AttachmentError::UnsupportedType(_))));

        let result = f.service.upload(2, f.task.id, file("empty.txt", "text/plain", b"")).await;
        assert!(matches!(result, Err(AttachmentError::EmptyFile)));
    }

    #[tokio::test]
    async fn test_delete_uploader_or_manager() {
        let f = fixture().await;
        let attachment = f
            .service
            .upload(2, f.task.id, file("pic.png", "image/png", b"\x89PNG"))
            .await
            .unwrap();

        assert!(matches!(
            f.service.delete(3, attachment.id).await,
            Err(AttachmentError::CannotDelete)
        ));
        f.service.delete(1, attachment.id).await.unwrap();
        assert!(matches!(
            f.service.download(2, attachment.id).await,
            Err(AttachmentError::Access(AccessError::NotFound("Attachment")))
        ));
    }
}
