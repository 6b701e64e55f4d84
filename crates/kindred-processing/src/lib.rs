//! Kindred photo upload admission.
//!
//! Every photo passes the same gate before it reaches object storage:
//! declared type and size checks, content signature verification, a
//! per-member upload rate limit, and a sanitized, collision-free storage key.

pub mod pipeline;
pub mod rate_limit;
pub mod sanitize;
pub mod signature;
pub mod types;
pub mod validator;

pub use pipeline::{build_storage_key, generate_storage_key, sanitize_prefix, UploadError, UploadService};
pub use rate_limit::{AttemptStore, InMemoryAttemptStore, RateDecision, UploadRateLimiter};
pub use sanitize::sanitize_file_name;
pub use signature::{validate_file_content, ImageFormat};
pub use types::{AdmittedUpload, StoredPhoto, UploadRequest};
pub use validator::{normalize_mime_type, UploadValidator, ValidationError};
