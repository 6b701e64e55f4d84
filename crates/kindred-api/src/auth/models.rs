use crate::error::HttpAppError;
use crate::state::AppState;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use kindred_core::constants::PHOTO_KEY_PREFIX;
use kindred_core::AppError;
use kindred_processing::{sanitize_file_name, sanitize_prefix};
use std::sync::Arc;

/// Member identity for the current request.
///
/// Read from the header the session gateway injects (`USER_ID_HEADER`,
/// `x-user-id` by default). The gateway has already authenticated the
/// member; this extractor only refuses requests whose identity is missing or
/// cannot be used verbatim as a storage key segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserContext {
    pub user_id: String,
}

/// True if `user_id` survives sanitization unchanged and is not a dot segment.
///
/// Only such ids map one-to-one onto a `photos/{user_id}` namespace.
pub fn is_valid_user_id(user_id: &str) -> bool {
    !user_id.is_empty()
        && !user_id.chars().all(|c| c == '.')
        && sanitize_file_name(user_id) == user_id
}

impl UserContext {
    /// Key prefix this member's photos are written under: `photos/{user_id}`.
    pub fn photo_prefix(&self) -> String {
        format!("{}/{}", PHOTO_KEY_PREFIX, self.user_id)
    }

    /// True if `key` lies under this member's own photo prefix.
    pub fn owns_key(&self, key: &str) -> bool {
        key.strip_prefix(self.photo_prefix().as_str())
            .is_some_and(|rest| rest.starts_with('/') && rest.len() > 1)
    }

    /// Resolve the prefix for a new upload.
    ///
    /// Without a requested prefix the member's own namespace is used. A
    /// requested prefix is sanitized and must stay inside that namespace.
    pub fn upload_prefix(&self, requested: Option<&str>) -> Result<String, AppError> {
        let own = self.photo_prefix();
        let Some(requested) = requested else {
            return Ok(own);
        };

        let prefix =
            sanitize_prefix(requested).map_err(|e| AppError::InvalidInput(e.to_string()))?;
        let inside = prefix == own
            || prefix
                .strip_prefix(own.as_str())
                .is_some_and(|rest| rest.starts_with('/'));

        if !inside {
            tracing::warn!(
                user_id = %self.user_id,
                prefix = %prefix,
                "Upload prefix outside member namespace"
            );
            return Err(AppError::Forbidden(
                "Upload prefix is outside the caller's photo namespace".to_string(),
            ));
        }

        Ok(prefix)
    }
}

// Implement FromRequestParts for UserContext to work with Multipart
impl FromRequestParts<Arc<AppState>> for UserContext {
    type Rejection = HttpAppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let header_name = state.config.user_id_header();

        let user_id = parts
            .headers
            .get(header_name)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .ok_or_else(|| {
                tracing::debug!(header = %header_name, "Request without member identity");
                HttpAppError(AppError::Unauthorized(
                    "Missing member identity".to_string(),
                ))
            })?;

        if !is_valid_user_id(user_id) {
            tracing::warn!(header = %header_name, "Member identity is not a valid key segment");
            return Err(HttpAppError(AppError::Unauthorized(
                "Invalid member identity".to_string(),
            )));
        }

        Ok(UserContext {
            user_id: user_id.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(user_id: &str) -> UserContext {
        UserContext {
            user_id: user_id.to_string(),
        }
    }

    #[test]
    fn test_photo_prefix() {
        assert_eq!(ctx("user-1").photo_prefix(), "photos/user-1");
    }

    #[test]
    fn test_owns_key() {
        let user = ctx("user-1");
        assert!(user.owns_key("photos/user-1/123-abcdef-me.jpg"));
        assert!(!user.owns_key("photos/user-12/123-abcdef-me.jpg"));
        assert!(!user.owns_key("photos/user-2/123-abcdef-me.jpg"));
        assert!(!user.owns_key("photos/user-1/"));
        assert!(!user.owns_key("photos/user-1"));
    }

    #[test]
    fn test_user_id_must_be_a_verbatim_key_segment() {
        assert!(is_valid_user_id("user-1"));
        assert!(is_valid_user_id("a_b"));
        assert!(is_valid_user_id("alice.example"));
        assert!(!is_valid_user_id("a b"));
        assert!(!is_valid_user_id("a@b"));
        assert!(!is_valid_user_id("a/b"));
        assert!(!is_valid_user_id("a..b"));
        assert!(!is_valid_user_id("."));
        assert!(!is_valid_user_id(".."));
        assert!(!is_valid_user_id(&"u".repeat(101)));
    }

    #[test]
    fn test_upload_prefix_defaults_to_own_namespace() {
        assert_eq!(ctx("user-1").upload_prefix(None).unwrap(), "photos/user-1");
    }

    #[test]
    fn test_upload_prefix_allows_sub_paths() {
        let user = ctx("user-1");
        assert_eq!(
            user.upload_prefix(Some("photos/user-1/gallery")).unwrap(),
            "photos/user-1/gallery"
        );
        assert_eq!(
            user.upload_prefix(Some("/photos//user-1/")).unwrap(),
            "photos/user-1"
        );
    }

    #[test]
    fn test_upload_prefix_rejects_foreign_namespace() {
        let user = ctx("user-1");
        assert!(matches!(
            user.upload_prefix(Some("photos/victim")),
            Err(AppError::Forbidden(_))
        ));
        assert!(matches!(
            user.upload_prefix(Some("photos/user-12")),
            Err(AppError::Forbidden(_))
        ));
        assert!(matches!(
            user.upload_prefix(Some("photos/user-1/../victim")),
            Ok(ref p) if p == "photos/user-1/victim"
        ));
        assert!(matches!(
            user.upload_prefix(Some("avatars")),
            Err(AppError::Forbidden(_))
        ));
        assert!(matches!(
            user.upload_prefix(Some("///")),
            Err(AppError::InvalidInput(_))
        ));
    }
}
