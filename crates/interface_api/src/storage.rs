//! Local-disk document storage

use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;

use core_kernel::{DomainPort, PortError};
use domain_insurance::DocumentStore;

/// Stores claim documents as files under a private root directory
#[derive(Debug, Clone)]
pub struct LocalDiskDocumentStore {
    root: PathBuf,
}

impl LocalDiskDocumentStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Maps a relative storage path into the root, refusing escapes
    fn resolve(&self, path: &str) -> Result<PathBuf, PortError> {
        let relative = Path::new(path);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)));
        if path.is_empty() || escapes {
            return Err(PortError::validation_field(format!("Invalid document path: {}", path), "file"));
        }
        Ok(self.root.join(relative))
    }
}

impl DomainPort for LocalDiskDocumentStore {}

#[async_trait]
impl DocumentStore for LocalDiskDocumentStore {
    async fn put(&self, path: &str, bytes: Vec<u8>) -> Result<(), PortError> {
        let target = self.resolve(path)?;
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| PortError::internal_with_source(format!("Cannot create {}", parent.display()), e))?;
        }
        tokio::fs::write(&target, bytes)
            .await
            .map_err(|e| PortError::internal_with_source(format!("Cannot write {}", path), e))
    }

    async fn get(&self, path: &str) -> Result<Vec<u8>, PortError> {
        let target = self.resolve(path)?;
        match tokio::fs::read(&target).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(PortError::not_found("Document", path)),
            Err(e) => Err(PortError::internal_with_source(format!("Cannot read {}", path), e)),
        }
    }

    async fn delete(&self, path: &str) -> Result<(), PortError> {
        let target = self.resolve(path)?;
        match tokio::fs::remove_file(&target).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(PortError::internal_with_source(format!("Cannot delete {}", path), e)),
        }
    }
}
