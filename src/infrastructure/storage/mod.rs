//! Local Disk Storage
//!
//! [`FileStorage`] over a directory. Keys are generated by the attachment
//! service and map one-to-one onto file names; anything that could escape the
//! root directory is rejected.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tracing::debug;

use crate::application::storage::{FileStorage, StorageError};

const PROBE_FILE: &str = ".write-probe";

/// Files under a root directory, one file per key.
///
/// ```
/// use task_server::application::storage::FileStorage;
/// use task_server::infrastructure::storage::LocalFileStorage;
///
/// let dir = tempfile::tempdir().unwrap();
/// let storage = LocalFileStorage::new(dir.path());
///
/// tokio_test::block_on(async {
///     storage.put("report-1", b"hello").await.unwrap();
///     assert_eq!(storage.get("report-1").await.unwrap(), b"hello");
///     assert!(storage.put("../escape", b"x").await.is_err());
/// });
/// ```
#[derive(Debug, Clone)]
pub struct LocalFileStorage {
    root: PathBuf,
}

impl LocalFileStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StorageError> {
        let valid = !key.is_empty()
            && key.len() <= 128
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        Ok(self.root.join(key))
    }
}

#[async_trait]
impl FileStorage for LocalFileStorage {
    async fn put(&self, key: &str, bytes: &[u8]) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        fs::create_dir_all(&self.root).await?;
        fs::write(&path, bytes).await?;
        debug!(key, size = bytes.len(), "Stored file");
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        let path = self.path_for(key)?;
        match fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(key.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn ping(&self) -> Result<(), StorageError> {
        fs::create_dir_all(&self.root).await?;
        let probe = self.root.join(PROBE_FILE);
        fs::write(&probe, b"ok").await?;
        fs::remove_file(&probe).await?;
        Ok(())
    }
}
