use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;

use crate::domain::{AssetStorage, DomainError};

/// Assets as plain files under one directory, named `<uuid>.<ext>`.
#[derive(Debug, Clone)]
pub struct LocalDiskStorage {
    root: PathBuf,
}

impl LocalDiskStorage {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Reject names that would escape the root.
    fn path_for(&self, filename: &str) -> Result<PathBuf, DomainError> {
        let plain = !filename.is_empty()
            && !filename.contains(['/', '\\'])
            && filename != "."
            && filename != "..";
        if !plain {
            return Err(DomainError::validation("filename", "invalid asset file name"));
        }
        Ok(self.root.join(filename))
    }
}

fn generated_name(original_name: &str) -> String {
    let id = uuid::Uuid::new_v4().simple();
    let ext = Path::new(original_name)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty() && e.chars().all(|c| c.is_ascii_alphanumeric()));
    match ext {
        Some(ext) => format!("{id}.{}", ext.to_ascii_lowercase()),
        None => id.to_string(),
    }
}

#[async_trait]
impl AssetStorage for LocalDiskStorage {
    async fn upload(&self, original_name: &str, bytes: Bytes) -> Result<String, DomainError> {
        tokio::fs::create_dir_all(&self.root).await.map_err(|e| {
            DomainError::asset_storage(format!("create {}: {e}", self.root.display()))
        })?;

        let filename = generated_name(original_name);
        let path = self.root.join(&filename);
        tokio::fs::write(&path, &bytes)
            .await
            .map_err(|e| DomainError::asset_storage(format!("write {}: {e}", path.display())))?;

        tracing::debug!(%filename, size = bytes.len(), "asset stored");
        Ok(filename)
    }

    async fn delete(&self, filename: &str) -> Result<(), DomainError> {
        let path = self.path_for(filename)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(%filename, "asset file already gone");
                Ok(())
            }
            Err(e) => Err(DomainError::asset_storage(format!(
                "remove {}: {e}",
                path.display()
            ))),
        }
    }
}
