//! Configuration module
//!
//! This module provides configuration structures for the photo service:
//! server settings, storage backend selection, and upload admission limits.

use std::env;

use crate::constants::SUPPORTED_IMAGE_TYPES;
use crate::storage_types::StorageBackend;

// Common constants
const SERVER_PORT: u16 = 4000;
const USER_ID_HEADER: &str = "x-user-id";
const MAX_UPLOAD_SIZE_MB: usize = 5;
// Documented as 10 in places; 20 is the enforced ceiling.
const UPLOAD_RATE_LIMIT: u32 = 20;
const UPLOAD_RATE_WINDOW_SECS: u64 = 3600;
const UPLOAD_RATE_MAX_ENTRIES: usize = 100_000;
const UPLOAD_RATE_CLEANUP_INTERVAL_SECS: u64 = 300;

/// Base configuration shared by every service binary
#[derive(Clone, Debug)]
pub struct BaseConfig {
    pub server_port: u16,
    pub environment: String,
    /// Header carrying the member identity, injected by the trusted session layer.
    pub user_id_header: String,
}

/// Photo service configuration
#[derive(Clone, Debug)]
pub struct PhotoServiceConfig {
    pub base: BaseConfig,
    // Storage configuration
    pub storage_backend: Option<StorageBackend>,
    pub s3_bucket: Option<String>,
    pub s3_region: Option<String>,
    pub s3_endpoint: Option<String>, // Custom endpoint for S3-compatible providers (MinIO, R2, etc.)
    pub aws_region: Option<String>,
    pub storage_public_base_url: Option<String>,
    pub local_storage_path: Option<String>,
    pub local_storage_base_url: Option<String>,
    // Upload admission
    pub max_upload_size_bytes: usize,
    pub allowed_image_types: Vec<String>,
    pub upload_rate_limit: u32,
    pub upload_rate_window_secs: u64,
    pub upload_rate_max_entries: usize,
    /// Interval in seconds between sweeps of expired rate-limit buckets. 0 = disabled.
    pub upload_rate_cleanup_interval_secs: u64,
}

/// Application configuration (photo service).
#[derive(Clone, Debug)]
pub struct Config(pub Box<PhotoServiceConfig>);

impl Config {
    fn as_photo(&self) -> &PhotoServiceConfig {
        &self.0
    }

    pub fn from_env() -> Result<Self, anyhow::Error> {
        let config = PhotoServiceConfig::from_env()?;
        Ok(Config(Box::new(config)))
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        self.as_photo().validate()
    }

    pub fn server_port(&self) -> u16 {
        self.as_photo().base.server_port
    }

    pub fn environment(&self) -> &str {
        &self.as_photo().base.environment
    }

    pub fn user_id_header(&self) -> &str {
        &self.as_photo().base.user_id_header
    }

    pub fn storage_backend(&self) -> Option<StorageBackend> {
        self.as_photo().storage_backend
    }

    pub fn s3_bucket(&self) -> Option<&str> {
        self.as_photo().s3_bucket.as_deref()
    }

    pub fn s3_region(&self) -> Option<&str> {
        self.as_photo().s3_region.as_deref()
    }

    pub fn s3_endpoint(&self) -> Option<&str> {
        self.as_photo().s3_endpoint.as_deref()
    }

    pub fn aws_region(&self) -> Option<&str> {
        self.as_photo().aws_region.as_deref()
    }

    pub fn storage_public_base_url(&self) -> Option<&str> {
        self.as_photo().storage_public_base_url.as_deref()
    }

    pub fn local_storage_path(&self) -> Option<&str> {
        self.as_photo().local_storage_path.as_deref()
    }

    pub fn local_storage_base_url(&self) -> Option<&str> {
        self.as_photo().local_storage_base_url.as_deref()
    }

    pub fn max_upload_size_bytes(&self) -> usize {
        self.as_photo().max_upload_size_bytes
    }

    pub fn allowed_image_types(&self) -> &[String] {
        &self.as_photo().allowed_image_types
    }

    pub fn upload_rate_limit(&self) -> u32 {
        self.as_photo().upload_rate_limit
    }

    pub fn upload_rate_window_secs(&self) -> u64 {
        self.as_photo().upload_rate_window_secs
    }

    pub fn upload_rate_max_entries(&self) -> usize {
        self.as_photo().upload_rate_max_entries
    }

    pub fn upload_rate_cleanup_interval_secs(&self) -> u64 {
        self.as_photo().upload_rate_cleanup_interval_secs
    }
}

impl PhotoServiceConfig {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, anyhow::Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|s| !s.trim().is_empty());

        let environment = var("ENVIRONMENT")
            .or_else(|| var("APP_ENV"))
            .unwrap_or_else(|| "development".to_string());

        let storage_backend = match var("STORAGE_BACKEND") {
            Some(s) => Some(s.parse::<StorageBackend>()?),
            None => None,
        };

        let max_upload_size_mb = var("MAX_UPLOAD_SIZE_MB")
            .unwrap_or_else(|| MAX_UPLOAD_SIZE_MB.to_string())
            .parse::<usize>()
            .unwrap_or(MAX_UPLOAD_SIZE_MB);
        let max_upload_size_bytes = max_upload_size_mb
            .checked_mul(1024 * 1024)
            .ok_or_else(|| anyhow::anyhow!("MAX_UPLOAD_SIZE_MB is too large"))?;

        let allowed_image_types = var("ALLOWED_IMAGE_TYPES")
            .unwrap_or_else(|| SUPPORTED_IMAGE_TYPES.join(","))
            .split(',')
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty())
            .collect();

        let base = BaseConfig {
            server_port: var("PORT")
                .unwrap_or_else(|| SERVER_PORT.to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number"))?,
            environment,
            user_id_header: var("USER_ID_HEADER")
                .unwrap_or_else(|| USER_ID_HEADER.to_string())
                .to_lowercase(),
        };

        let config = PhotoServiceConfig {
            base,
            storage_backend,
            s3_bucket: var("S3_BUCKET"),
            s3_region: var("S3_REGION"),
            s3_endpoint: var("S3_ENDPOINT"),
            aws_region: var("AWS_REGION"),
            storage_public_base_url: var("STORAGE_PUBLIC_BASE_URL"),
            local_storage_path: var("LOCAL_STORAGE_PATH"),
            local_storage_base_url: var("LOCAL_STORAGE_BASE_URL"),
            max_upload_size_bytes,
            allowed_image_types,
            upload_rate_limit: var("UPLOAD_RATE_LIMIT")
                .unwrap_or_else(|| UPLOAD_RATE_LIMIT.to_string())
                .parse()
                .unwrap_or(UPLOAD_RATE_LIMIT),
            upload_rate_window_secs: var("UPLOAD_RATE_WINDOW_SECS")
                .unwrap_or_else(|| UPLOAD_RATE_WINDOW_SECS.to_string())
                .parse()
                .unwrap_or(UPLOAD_RATE_WINDOW_SECS),
            upload_rate_max_entries: var("UPLOAD_RATE_MAX_ENTRIES")
                .unwrap_or_else(|| UPLOAD_RATE_MAX_ENTRIES.to_string())
                .parse()
                .unwrap_or(UPLOAD_RATE_MAX_ENTRIES),
            upload_rate_cleanup_interval_secs: var("UPLOAD_RATE_CLEANUP_INTERVAL_SECS")
                .unwrap_or_else(|| UPLOAD_RATE_CLEANUP_INTERVAL_SECS.to_string())
                .parse()
                .unwrap_or(UPLOAD_RATE_CLEANUP_INTERVAL_SECS),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.base.user_id_header.is_empty() {
            return Err(anyhow::anyhow!("USER_ID_HEADER must not be empty"));
        }

        if self.max_upload_size_bytes == 0 {
            return Err(anyhow::anyhow!("MAX_UPLOAD_SIZE_MB must be greater than 0"));
        }

        if self.allowed_image_types.is_empty() {
            return Err(anyhow::anyhow!(
                "ALLOWED_IMAGE_TYPES must list at least one image type"
            ));
        }

        if let Some(unknown) = self
            .allowed_image_types
            .iter()
            .find(|t| !SUPPORTED_IMAGE_TYPES.contains(&t.as_str()))
        {
            return Err(anyhow::anyhow!(
                "ALLOWED_IMAGE_TYPES contains unsupported type '{}' (supported: {})",
                unknown,
                SUPPORTED_IMAGE_TYPES.join(", ")
            ));
        }

        if self.upload_rate_limit == 0 {
            return Err(anyhow::anyhow!("UPLOAD_RATE_LIMIT must be greater than 0"));
        }

        if self.upload_rate_window_secs == 0 {
            return Err(anyhow::anyhow!(
                "UPLOAD_RATE_WINDOW_SECS must be greater than 0"
            ));
        }

        if self.upload_rate_max_entries == 0 {
            return Err(anyhow::anyhow!(
                "UPLOAD_RATE_MAX_ENTRIES must be greater than 0"
            ));
        }

        // Validate storage backend configuration
        let backend = self.storage_backend.unwrap_or(StorageBackend::S3);
        match backend {
            StorageBackend::S3 => {
                if self.s3_bucket.is_none() {
                    return Err(anyhow::anyhow!(
                        "S3_BUCKET must be set when using S3 storage backend"
                    ));
                }
                if self.s3_region.is_none() && self.aws_region.is_none() {
                    return Err(anyhow::anyhow!(
                        "S3_REGION or AWS_REGION must be set when using S3 storage backend"
                    ));
                }
            }
            StorageBackend::Local => {
                if self.local_storage_path.is_none() {
                    return Err(anyhow::anyhow!(
                        "LOCAL_STORAGE_PATH must be set when using local storage backend"
                    ));
                }
                if self.local_storage_base_url.is_none() {
                    return Err(anyhow::anyhow!(
                        "LOCAL_STORAGE_BASE_URL must be set when using local storage backend"
                    ));
                }
            }
        }

        Ok(())
    }
}
