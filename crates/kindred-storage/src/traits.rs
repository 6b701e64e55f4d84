//! Storage abstraction trait
//!
//! This module defines the ObjectStorage trait that all storage backends must implement.

use crate::StorageBackend;
use async_trait::async_trait;
use thiserror::Error;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Storage backend error: {0}")]
    BackendError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// HTTP metadata stored alongside an object and served back on GET.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectMetadata {
    pub cache_control: Option<String>,
    pub content_disposition: Option<String>,
}

impl ObjectMetadata {
    pub fn new(cache_control: impl Into<String>, content_disposition: impl Into<String>) -> Self {
        Self {
            cache_control: Some(cache_control.into()),
            content_disposition: Some(content_disposition.into()),
        }
    }
}

/// Object storage collaborator
///
/// Backends address a flat key namespace and return publicly reachable URLs.
/// Errors are surfaced as [`StorageError`]; no backend retries on its own.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Write `data` under `key` and return the public URL of the object.
    async fn put(
        &self,
        key: &str,
        data: Vec<u8>,
        content_type: &str,
        metadata: &ObjectMetadata,
    ) -> StorageResult<String>;

    /// Delete the object stored under `key`. Deleting a missing object succeeds.
    async fn delete(&self, key: &str) -> StorageResult<()>;

    /// Check if an object exists
    async fn exists(&self, key: &str) -> StorageResult<bool>;

    /// Public URL an object stored under `key` is served from.
    fn public_url(&self, key: &str) -> String;

    /// Get the storage backend type
    fn backend_type(&self) -> StorageBackend;
}
