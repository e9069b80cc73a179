//! Insurance Domain Ports
//!
//! Claim documents are stored outside the database. The domain only knows
//! the `DocumentStore` trait; the HTTP server wires in a local-disk adapter
//! and tests use the in-memory one below.
//!
//! ```rust,ignore
//! use domain_insurance::ports::DocumentStore;
//! use std::sync::Arc;
//!
//! async fn remove_claim_files(store: Arc<dyn DocumentStore>, claim: &InsuranceClaim) {
//!     for document in &claim.documents {
//!         store.delete(&document.path).await?;
//!     }
//! }
//! ```

use async_trait::async_trait;

use core_kernel::{DomainPort, PortError};

/// Private blob storage for claim documents, addressed by relative path
#[async_trait]
pub trait DocumentStore: DomainPort {
    /// Writes the bytes at `path`, replacing anything already there
    async fn put(&self, path: &str, bytes: Vec<u8>) -> Result<(), PortError>;

    /// Reads the bytes at `path`
    ///
    /// # Errors
    ///
    /// `PortError::NotFound` when nothing is stored at `path`
    async fn get(&self, path: &str) -> Result<Vec<u8>, PortError>;

    /// Removes the file at `path`; a missing file is not an error
    async fn delete(&self, path: &str) -> Result<(), PortError>;
}

/// In-memory document store for tests
#[cfg(any(test, feature = "mock"))]
pub mod mock {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Arc;
    use tokio::sync::RwLock;

    #[derive(Debug, Default, Clone)]
    pub struct InMemoryDocumentStore {
        files: Arc<RwLock<HashMap<String, Vec<u8>>>>,
    }

    impl InMemoryDocumentStore {
        pub fn new() -> Self {
            Self::default()
        }

        pub async fn len(&self) -> usize {
            self.files.read().await.len()
        }

        pub async fn contains(&self, path: &str) -> bool {
            self.files.read().await.contains_key(path)
        }
    }

    impl DomainPort for InMemoryDocumentStore {}

    #[async_trait]
    impl DocumentStore for InMemoryDocumentStore {
        async fn put(&self, path: &str, bytes: Vec<u8>) -> Result<(), PortError> {
            self.files.write().await.insert(path.to_string(), bytes);
            Ok(())
        }

        async fn get(&self, path: &str) -> Result<Vec<u8>, PortError> {
            self.files
                .read()
                .await
                .get(path)
                .cloned()
                .ok_or_else(|| PortError::not_found("Document", path))
        }

        async fn delete(&self, path: &str) -> Result<(), PortError> {
            self.files.write().await.remove(path);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::mock::InMemoryDocumentStore;
    use super::*;

    #[tokio::test]
    async fn test_put_get_delete() {
        let store = InMemoryDocumentStore::new();
        store.put("insurance-claims/a/b.pdf", b"%PDF".to_vec()).await.unwrap();

        assert_eq!(store.get("insurance-claims/a/b.pdf").await.unwrap(), b"%PDF".to_vec());

        store.delete("insurance-claims/a/b.pdf").await.unwrap();
        assert!(store.get("insurance-claims/a/b.pdf").await.unwrap_err().is_not_found());
        // deleting twice is fine
        store.delete("insurance-claims/a/b.pdf").await.unwrap();
    }

    #[tokio::test]
    async fn test_usable_as_trait_object() {
        let store: std::sync::Arc<dyn DocumentStore> = std::sync::Arc::new(InMemoryDocumentStore::new());
        store.put("x", vec![1, 2, 3]).await.unwrap();
        assert_eq!(store.get("x").await.unwrap().len(), 3);
    }
}
