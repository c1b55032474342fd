//! Blob storage seam for attachment bytes.

use async_trait::async_trait;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Stored file not found: {0}")]
    NotFound(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Stores attachment content under opaque keys.
#[async_trait]
pub trait FileStorage: Send + Sync {
    async fn put(&self, key: &str, bytes: &[u8]) -> Result<(), StorageError>;

    async fn get(&self, key: &str) -> Result<Vec<u8>, StorageError>;

    /// Remove stored bytes. Missing keys are not an error.
    async fn delete(&self, key: &str) -> Result<(), StorageError>;

    /// Check that the backing store is writable.
    async fn ping(&self) -> Result<(), StorageError>;
}
