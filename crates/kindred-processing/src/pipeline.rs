//! Upload orchestration: rate limit → validate → key → store.
//!
//! [`UploadService`] is the only path by which member photos reach object
//! storage. Every check runs before the storage write; nothing is written for
//! a rejected upload.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use rand::Rng;

use kindred_core::constants::{PHOTO_CACHE_CONTROL, PHOTO_CONTENT_DISPOSITION};
use kindred_core::Config;
use kindred_storage::{ObjectMetadata, ObjectStorage, StorageError};

use crate::rate_limit::{InMemoryAttemptStore, RateDecision, UploadRateLimiter};
use crate::sanitize::{base_name, sanitize_file_name};
use crate::signature::ImageFormat;
use crate::types::{AdmittedUpload, StoredPhoto, UploadRequest};
use crate::validator::{UploadValidator, ValidationError};

const RANDOM_SUFFIX_LEN: usize = 6;
const FALLBACK_BASE_NAME: &str = "photo";

/// Upload failures, tagged by cause
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Upload rate limit exceeded, retry after {} seconds", .retry_after.as_secs())]
    RateLimited { retry_after: Duration },

    #[error("Storage {operation} failed for {key}: {source}")]
    Storage {
        operation: &'static str,
        key: String,
        #[source]
        source: StorageError,
    },
}

impl UploadError {
    fn storage(operation: &'static str, key: &str, source: StorageError) -> Self {
        UploadError::Storage {
            operation,
            key: key.to_string(),
            source,
        }
    }
}

/// Sanitize a `/`-separated key prefix segment by segment.
///
/// Segments that sanitize to nothing (or to a lone `.`) are dropped. A prefix
/// with no segments left is rejected.
pub fn sanitize_prefix(prefix: &str) -> Result<String, ValidationError> {
    let segments: Vec<String> = prefix
        .split('/')
        .map(sanitize_file_name)
        .filter(|segment| !segment.is_empty() && segment != ".")
        .collect();

    if segments.is_empty() {
        return Err(ValidationError::InvalidPrefix(prefix.to_string()));
    }

    Ok(segments.join("/"))
}

/// Assemble `{prefix}/{timestamp_ms}-{random}-{base}.{ext}`.
pub fn build_storage_key(
    prefix: &str,
    timestamp_ms: i64,
    random: &str,
    file_name: Option<&str>,
    format: ImageFormat,
) -> Result<String, ValidationError> {
    let prefix = sanitize_prefix(prefix)?;

    let base = file_name
        .map(|name| sanitize_file_name(base_name(name)))
        .map(|base| base.trim_matches('.').to_string())
        .filter(|base| !base.is_empty())
        .unwrap_or_else(|| FALLBACK_BASE_NAME.to_string());

    Ok(format!(
        "{}/{}-{}-{}.{}",
        prefix,
        timestamp_ms,
        random,
        base,
        format.extension()
    ))
}

fn random_suffix() -> String {
    rand::rng()
        .sample_iter(&rand::distr::Alphanumeric)
        .take(RANDOM_SUFFIX_LEN)
        .map(char::from)
        .collect()
}

/// Storage key for a new upload, unique per call with overwhelming probability.
pub fn generate_storage_key(
    prefix: &str,
    file_name: Option<&str>,
    format: ImageFormat,
) -> Result<String, ValidationError> {
    build_storage_key(
        prefix,
        Utc::now().timestamp_millis(),
        &random_suffix(),
        file_name,
        format,
    )
}

/// Photo upload service
#[derive(Clone)]
pub struct UploadService {
    storage: Arc<dyn ObjectStorage>,
    validator: UploadValidator,
    rate_limiter: UploadRateLimiter,
    metadata: ObjectMetadata,
}

impl UploadService {
    pub fn new(
        storage: Arc<dyn ObjectStorage>,
        validator: UploadValidator,
        rate_limiter: UploadRateLimiter,
    ) -> Self {
        Self {
            storage,
            validator,
            rate_limiter,
            metadata: ObjectMetadata::new(PHOTO_CACHE_CONTROL, PHOTO_CONTENT_DISPOSITION),
        }
    }

    /// Wire validator and in-memory rate limiter from configuration.
    pub fn from_config(config: &Config, storage: Arc<dyn ObjectStorage>) -> Self {
        let validator = UploadValidator::from_content_types(
            config.max_upload_size_bytes(),
            config.allowed_image_types(),
        );
        let rate_limiter = UploadRateLimiter::with_store(
            Arc::new(InMemoryAttemptStore::new(config.upload_rate_max_entries())),
            config.upload_rate_limit(),
            Duration::from_secs(config.upload_rate_window_secs()),
        );
        Self::new(storage, validator, rate_limiter)
    }

    pub fn rate_limiter(&self) -> &UploadRateLimiter {
        &self.rate_limiter
    }

    pub fn validator(&self) -> &UploadValidator {
        &self.validator
    }

    pub fn storage(&self) -> &Arc<dyn ObjectStorage> {
        &self.storage
    }

    /// Count the attempt against `user_id`, then upload.
    ///
    /// The attempt is counted even when validation later rejects the photo.
    #[tracing::instrument(skip(self, request))]
    pub async fn admit_and_upload(
        &self,
        user_id: &str,
        request: UploadRequest,
    ) -> Result<AdmittedUpload, UploadError> {
        let remaining = match self.rate_limiter.check(user_id).await {
            RateDecision::Allowed { remaining } => remaining,
            RateDecision::Limited { retry_after } => {
                return Err(UploadError::RateLimited { retry_after })
            }
        };

        let photo = self.upload_file(request).await?;
        Ok(AdmittedUpload { photo, remaining })
    }

    /// Validate and store a photo, returning its key and public URL.
    #[tracing::instrument(
        skip(self, request),
        fields(content_type = %request.content_type, size_bytes = request.data.len())
    )]
    pub async fn upload_file(&self, request: UploadRequest) -> Result<StoredPhoto, UploadError> {
        let UploadRequest {
            data,
            content_type,
            file_name,
            prefix,
        } = request;

        let format = self.validator.validate_all(&content_type, &data).map_err(|e| {
            tracing::warn!(
                error = %e,
                content_type = %content_type,
                size_bytes = data.len(),
                "Photo upload rejected"
            );
            e
        })?;

        let key = generate_storage_key(&prefix, file_name.as_deref(), format)?;
        let size = data.len();
        let start = Instant::now();

        let url = self
            .storage
            .put(&key, data, format.mime_type(), &self.metadata)
            .await
            .map_err(|e| {
                tracing::error!(
                    error = %e,
                    key = %key,
                    size_bytes = size,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "Photo storage write failed"
                );
                UploadError::storage("put", &key, e)
            })?;

        tracing::info!(
            key = %key,
            content_type = %format.mime_type(),
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Photo uploaded"
        );

        Ok(StoredPhoto {
            storage_key: key,
            url,
            content_type: format.mime_type().to_string(),
            size_bytes: size,
        })
    }

    /// Delete a stored photo. Deleting a missing key succeeds.
    #[tracing::instrument(skip(self))]
    pub async fn delete_file(&self, key: &str) -> Result<(), UploadError> {
        self.storage.delete(key).await.map_err(|e| {
            tracing::error!(error = %e, key = %key, "Photo delete failed");
            UploadError::storage("delete", key, e)
        })?;

        tracing::info!(key = %key, "Photo deleted");
        Ok(())
    }

    /// Delete for call sites that must carry on regardless. Returns `false` on failure.
    pub async fn delete_file_best_effort(&self, key: &str) -> bool {
        match self.storage.delete(key).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(error = %e, key = %key, "Best-effort photo delete failed, object may be orphaned");
                false
            }
        }
    }
}
