//! Kindred Storage Library
//!
//! This crate provides the object storage abstraction used by the photo
//! upload pipeline, with implementations for S3 (and S3-compatible stores)
//! and the local filesystem.
//!
//! # Storage key format
//!
//! Keys form a flat namespace of `/`-separated segments, e.g.
//! `photos/{user_id}/{timestamp}-{suffix}-{name}.{ext}`. Keys must not
//! contain `..`, a leading `/` or empty segments; see [`keys::validate_key`].

pub mod factory;
pub mod keys;
#[cfg(feature = "storage-local")]
pub mod local;
#[cfg(feature = "storage-s3")]
pub mod s3;
pub mod traits;

// Re-export commonly used types
pub use factory::create_storage;
pub use kindred_core::StorageBackend;
#[cfg(feature = "storage-local")]
pub use local::LocalStorage;
#[cfg(feature = "storage-s3")]
pub use s3::S3Storage;
pub use traits::{ObjectMetadata, ObjectStorage, StorageError, StorageResult};
