use std::sync::Arc;

use axum::{
    extract::{Multipart, State},
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use kindred_core::AppError;
use kindred_processing::{StoredPhoto, UploadRequest};
use serde::Serialize;

use crate::auth::UserContext;
use crate::error::HttpAppError;
use crate::state::AppState;

pub const X_RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
pub const X_RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");

#[derive(Debug, Serialize)]
pub struct PhotoResponse {
    pub url: String,
    pub key: String,
    pub content_type: String,
    pub size_bytes: usize,
}

impl From<StoredPhoto> for PhotoResponse {
    fn from(photo: StoredPhoto) -> Self {
        Self {
            url: photo.url,
            key: photo.storage_key,
            content_type: photo.content_type,
            size_bytes: photo.size_bytes,
        }
    }
}

/// Fields read from the upload form.
#[derive(Debug, Default)]
struct PhotoForm {
    data: Option<Vec<u8>>,
    content_type: Option<String>,
    file_name: Option<String>,
    prefix: Option<String>,
}

/// Read the multipart form. Exactly one field named "file" is accepted;
/// `file_name` and `prefix` are optional text fields.
async fn extract_photo_form(mut multipart: Multipart) -> Result<PhotoForm, HttpAppError> {
    let mut form = PhotoForm::default();

    while let Some(field) = multipart.next_field().await? {
        let field_name = field.name().map(|s| s.to_string()).unwrap_or_default();

        match field_name.as_str() {
            "file" => {
                if form.data.is_some() {
                    return Err(AppError::InvalidInput(
                        "Multiple file fields are not allowed; send exactly one field named 'file'"
                            .to_string(),
                    )
                    .into());
                }
                if form.file_name.is_none() {
                    form.file_name = field.file_name().map(|s: &str| s.to_string());
                }
                form.content_type = field.content_type().map(|s: &str| s.to_string());
                form.data = Some(field.bytes().await?.to_vec());
            }
            "file_name" => {
                let text = field.text().await?;
                if !text.trim().is_empty() {
                    form.file_name = Some(text);
                }
            }
            "prefix" => {
                let text = field.text().await?;
                if !text.trim().is_empty() {
                    form.prefix = Some(text);
                }
            }
            other => {
                tracing::debug!(field = %other, "Ignoring unknown multipart field");
            }
        }
    }

    Ok(form)
}

/// Upload photo handler
///
/// Counts the attempt against the member's upload limit, validates the
/// photo and stores it.
///
/// # Returns
/// `PhotoResponse` on success (HTTP 201 Created) with `X-RateLimit-Limit`
/// and `X-RateLimit-Remaining` headers.
///
/// # Errors
/// - 400 for an invalid form, type, size or content
/// - 401 without a usable member identity
/// - 403 when `prefix` lies outside the member's `photos/{user_id}` namespace
/// - 429 once the upload limit is reached (with `Retry-After`)
/// - 500 when storage fails
#[tracing::instrument(
    skip(state, multipart),
    fields(user_id = %user.user_id, operation = "upload_photo")
)]
pub async fn upload_photo(
    State(state): State<Arc<AppState>>,
    user: UserContext,
    multipart: Multipart,
) -> Result<Response, HttpAppError> {
    let form = extract_photo_form(multipart).await?;

    let data = form
        .data
        .ok_or_else(|| AppError::InvalidInput("No file provided".to_string()))?;
    let content_type = form
        .content_type
        .unwrap_or_else(|| "application/octet-stream".to_string());
    let prefix = user.upload_prefix(form.prefix.as_deref())?;

    let request = UploadRequest {
        data,
        content_type,
        file_name: form.file_name,
        prefix,
    };

    let admitted = state.upload.admit_and_upload(&user.user_id, request).await?;

    let mut headers = HeaderMap::new();
    headers.insert(
        X_RATELIMIT_LIMIT,
        HeaderValue::from(state.upload.rate_limiter().ceiling()),
    );
    headers.insert(X_RATELIMIT_REMAINING, HeaderValue::from(admitted.remaining));

    Ok((
        StatusCode::CREATED,
        headers,
        Json(PhotoResponse::from(admitted.photo)),
    )
        .into_response())
}
