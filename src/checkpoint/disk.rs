/// Disk-based storage adapter
use crate::checkpoint::StorageAdapter;
use crate::error::{AnchorError, AnchorResult};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;

/// Stores values as files under a base directory.
///
/// Keys are relative paths (`checkpoints/<id>.json`); parent directories are
/// created on demand. Missing keys read as `None` and delete as a no-op.
#[derive(Clone)]
pub struct DiskStorageAdapter {
    base_path: PathBuf,
}

impl DiskStorageAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn path_for(&self, key: &str) -> AnchorResult<PathBuf> {
        // Reject keys that escape the base directory
        let relative = Path::new(key);
        if relative.is_absolute()
            || relative
                .components()
                .any(|c| matches!(c, std::path::Component::ParentDir))
        {
            return Err(AnchorError::Storage(format!("invalid storage key: {}", key)));
        }
        Ok(self.base_path.join(relative))
    }
}

#[async_trait]
impl StorageAdapter for DiskStorageAdapter {
    async fn put(&self, key: &str, data: Vec<u8>, _content_type: &str) -> AnchorResult<()> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| {
                AnchorError::Storage(format!("Failed to create directory for {}: {}", key, e))
            })?;
        }

        fs::write(&path, data)
            .await
            .map_err(|e| AnchorError::Storage(format!("Failed to write {}: {}", key, e)))?;

        Ok(())
    }

    async fn get(&self, key: &str) -> AnchorResult<Option<Vec<u8>>> {
        let path = self.path_for(key)?;

        match fs::read(&path).await {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AnchorError::Storage(format!(
                "Failed to read {}: {}",
                key, e
            ))),
        }
    }

    async fn delete(&self, key: &str) -> AnchorResult<()> {
        let path = self.path_for(key)?;

        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AnchorError::Storage(format!(
                "Failed to delete {}: {}",
                key, e
            ))),
        }
    }
}
