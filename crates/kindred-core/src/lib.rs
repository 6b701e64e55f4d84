//! Kindred Core Library
//!
//! This crate provides the configuration, error types and shared constants
//! used by every Kindred photo-service component.

pub mod config;
pub mod constants;
pub mod error;
pub mod storage_types;

// Re-export commonly used types
pub use config::{BaseConfig, Config, PhotoServiceConfig};
pub use error::{AppError, ErrorMetadata, LogLevel};
pub use storage_types::StorageBackend;
