use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use crate::error::{Error, Result};
use super::BlobStore;

/// Blob store backed by a directory tree.
///
/// Blob paths are relative, `/`-separated and may not escape the root.
#[derive(Debug, Clone)]
pub struct LocalBlobStore {
    root: PathBuf,
}

impl LocalBlobStore {
    pub fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref();
        std::fs::create_dir_all(root).map_err(|e| {
            Error::StoreOpen(format!("Failed to create blob directory {}: {e}", root.display()))
        })?;
        debug!("Opened blob store at {}", root.display());
        Ok(Self {
            root: root.to_path_buf(),
        })
    }

    fn resolve(&self, path: &str) -> Result<PathBuf> {
        let relative = Path::new(path);
        let well_formed = !path.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !well_formed {
            return Err(Error::StorageTransfer {
                path: path.to_string(),
                reason: "invalid blob path".to_string(),
            });
        }
        Ok(self.root.join(relative))
    }
}

fn transfer_error(path: &str, e: &std::io::Error) -> Error {
    Error::StorageTransfer {
        path: path.to_string(),
        reason: e.to_string(),
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn put(&self, path: &str, bytes: Vec<u8>) -> Result<()> {
        let target = self.resolve(path)?;
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| transfer_error(path, &e))?;
        }

        // Readers never observe a half-written blob
        let partial = target.with_extension(format!("partial-{}", uuid::Uuid::new_v4()));
        tokio::fs::write(&partial, &bytes)
            .await
            .map_err(|e| transfer_error(path, &e))?;
        if let Err(e) = tokio::fs::rename(&partial, &target).await {
            let _ = tokio::fs::remove_file(&partial).await;
            return Err(transfer_error(path, &e));
        }

        debug!("Stored blob {} ({} bytes)", path, bytes.len());
        Ok(())
    }

    async fn get(&self, path: &str) -> Result<Vec<u8>> {
        let target = self.resolve(path)?;
        tokio::fs::read(&target)
            .await
            .map_err(|e| transfer_error(path, &e))
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        let target = self.resolve(path)?;
        tokio::fs::try_exists(&target)
            .await
            .map_err(|e| transfer_error(path, &e))
    }

    async fn delete(&self, path: &str) -> Result<()> {
        let target = self.resolve(path)?;
        match tokio::fs::remove_file(&target).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(transfer_error(path, &e)),
        }
    }

    async fn download_to(&self, path: &str, dest: &Path) -> Result<()> {
        let source = self.resolve(path)?;
        tokio::fs::copy(&source, dest)
            .await
            .map_err(|e| transfer_error(path, &e))?;
        Ok(())
    }
}
