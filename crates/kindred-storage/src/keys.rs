//! Shared key checks for storage backends.

use crate::{StorageError, StorageResult};

/// Reject keys that could escape the namespace or address nothing.
///
/// All backends call this before touching the store so a key accepted by one
/// backend is accepted by every other.
pub fn validate_key(key: &str) -> StorageResult<()> {
    if key.is_empty() {
        return Err(StorageError::InvalidKey("Storage key is empty".to_string()));
    }
    if key.contains("..") || key.starts_with('/') || key.contains('\\') {
        return Err(StorageError::InvalidKey(
            "Storage key contains invalid characters".to_string(),
        ));
    }
    if key.split('/').any(|segment| segment.is_empty()) {
        return Err(StorageError::InvalidKey(
            "Storage key contains an empty segment".to_string(),
        ));
    }
    Ok(())
}

/// Join a base URL and a key with exactly one `/` between them.
pub fn join_url(base_url: &str, key: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), key)
}
