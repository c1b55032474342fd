//! Task Attachment entity and repository trait.
//!
//! Maps to the `attachments` table in the database schema.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::shared::error::AppError;

/// Represents a file attached to a task.
///
/// Maps to the `attachments` table:
/// - id: BIGINT PRIMARY KEY (Snowflake ID)
/// - task_id: BIGINT NOT NULL REFERENCES tasks(id)
/// - uploaded_by: BIGINT NOT NULL REFERENCES users(id)
/// - filename: VARCHAR(255) NOT NULL
/// - content_type: VARCHAR(100) NOT NULL (MIME type)
/// - size: BIGINT NOT NULL (bytes)
/// - storage_key: VARCHAR(64) NOT NULL UNIQUE
/// - checksum: CHAR(64) NOT NULL (SHA-256 hex)
/// - created_at: TIMESTAMPTZ NOT NULL
/// - deleted_at: TIMESTAMPTZ NULL (soft delete)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    pub id: i64,
    pub task_id: i64,
    pub uploaded_by: i64,

    /// Original filename, sanitized
    pub filename: String,

    /// MIME type (e.g., "image/png", "application/pdf")
    pub content_type: String,

    /// File size in bytes
    pub size: i64,

    /// Key of the stored bytes in the file storage
    pub storage_key: String,

    /// SHA-256 of the content, lowercase hex
    pub checksum: String,

    pub created_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Attachment {
    /// Check if this attachment is an image.
    pub fn is_image(&self) -> bool {
        self.content_type.starts_with("image/")
    }

    /// Value for the `Content-Disposition` header.
    pub fn content_disposition(&self) -> String {
        let disposition = if self.is_image() { "inline" } else { "attachment" };
        format!("{}; filename=\"{}\"", disposition, self.filename.replace('"', ""))
    }
}

/// Strip directory components and control characters from a client filename.
pub fn sanitize_filename(raw: &str) -> String {
    let base = raw.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = base
        .chars()
        .filter(|c| !c.is_control() && *c != '"')
        .take(255)
        .collect();
    let cleaned = cleaned.trim().trim_start_matches('.').to_string();
    if cleaned.is_empty() {
        "file".to_string()
    } else {
        cleaned
    }
}

/// Repository trait for Attachment data access operations.
#[async_trait]
pub trait AttachmentRepository: Send + Sync {
    async fn create(&self, attachment: &Attachment) -> Result<Attachment, AppError>;

    /// Find a live attachment.
    async fn find_by_id(&self, id: i64) -> Result<Option<Attachment>, AppError>;

    /// Live attachments of a task, oldest first.
    async fn list_for_task(&self, task_id: i64) -> Result<Vec<Attachment>, AppError>;

    async fn soft_delete(&self, id: i64, at: DateTime<Utc>) -> Result<(), AppError>;

    /// Physically delete attachments soft-deleted before `before`, or whose task,
    /// project or team was soft-deleted before `before`. Returns the purged rows so
    /// their stored files can be removed.
    async fn purge_deleted(&self, before: DateTime<Utc>) -> Result<Vec<Attachment>, AppError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn create_test_attachment(content_type: &str) -> Attachment {
        Attachment {
            id: 1,
            task_id: 2,
            uploaded_by: 3,
            filename: "report.pdf".into(),
            content_type: content_type.into(),
            size: 1024,
            storage_key: "abc".into(),
            checksum: "00".repeat(32),
            created_at: Utc::now(),
            deleted_at: None,
        }
    }

    #[test]
    fn test_content_disposition() {
        assert_eq!(
            create_test_attachment("application/pdf").content_disposition(),
            "attachment; filename=\"report.pdf\""
        );
        assert!(create_test_attachment("image/png")
            .content_disposition()
            .starts_with("inline"));
    }

    #[test_case("report.pdf", "report.pdf")]
    #[test_case("../../etc/passwd", "passwd")]
    #[test_case("C:\\Users\\me\\notes.txt", "notes.txt")]
    #[test_case("", "file")]
    #[test_case(".hidden", "hidden")]
    #[test_case("we\"ird\n.txt", "weird.txt")]
    fn test_sanitize_filename(raw: &str, expected: &str) {
        assert_eq!(sanitize_filename(raw), expected);
    }
}
