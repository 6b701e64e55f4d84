//! Route configuration and setup

use crate::handlers;
use crate::state::AppState;
use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, post},
    Router,
};
use kindred_core::constants::API_PREFIX;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Setup all application routes
pub fn setup_routes(state: Arc<AppState>) -> Router<()> {
    let body_limit = state.upload_body_limit();

    let photo_routes = Router::new()
        .route(
            "/photos",
            post(handlers::photo_upload::upload_photo).layer(DefaultBodyLimit::max(body_limit)),
        )
        .route("/photos/{*key}", delete(handlers::photo_delete::delete_photo));

    tracing::info!(body_limit_bytes = body_limit, "Photo routes configured");

    Router::new()
        .route("/health", get(handlers::health::health_check))
        .nest(API_PREFIX, photo_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
