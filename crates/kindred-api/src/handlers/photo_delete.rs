use crate::auth::UserContext;
use crate::error::HttpAppError;
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
};
use kindred_core::AppError;
use std::sync::Arc;

/// Delete one of the caller's own photos by storage key.
#[tracing::instrument(
    skip(state),
    fields(user_id = %user.user_id, key = %key, operation = "delete_photo")
)]
pub async fn delete_photo(
    user: UserContext,
    Path(key): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Result<StatusCode, HttpAppError> {
    if !user.owns_key(&key) {
        return Err(AppError::Forbidden("Photo does not belong to the caller".to_string()).into());
    }

    state.upload.delete_file(&key).await?;

    Ok(StatusCode::NO_CONTENT)
}
