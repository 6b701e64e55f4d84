//! Shared constants.

/// API base path prefix.
pub const API_PREFIX: &str = "/api/v0";

/// Storage prefix under which member photos are written: `photos/{user_id}`.
pub const PHOTO_KEY_PREFIX: &str = "photos";

/// MIME types the platform knows how to verify by content signature.
pub const SUPPORTED_IMAGE_TYPES: &[&str] = &["image/jpeg", "image/png", "image/webp", "image/avif"];

/// Cache-Control attached to every stored photo. Keys are unique per upload,
/// so objects never change once written.
pub const PHOTO_CACHE_CONTROL: &str = "public, max-age=31536000, immutable";

/// Content-Disposition attached to every stored photo.
pub const PHOTO_CONTENT_DISPOSITION: &str = "inline";
