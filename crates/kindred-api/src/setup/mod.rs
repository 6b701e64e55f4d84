//! Application setup and initialization
//!
//! This module contains all application initialization logic extracted from main.rs
//! for better organization and testability.

pub mod routes;
pub mod server;

use crate::state::AppState;
use anyhow::{Context, Result};
use kindred_core::Config;
use kindred_processing::UploadService;
use kindred_storage::{create_storage, ObjectStorage};
use std::sync::Arc;
use std::time::Duration;

/// Initialize the entire application
pub async fn initialize_app(config: Config) -> Result<(Arc<AppState>, axum::Router)> {
    // Validate configuration first - fail fast on misconfiguration
    config.validate().context("Configuration validation failed")?;

    crate::telemetry::init_telemetry()
        .map_err(|e| anyhow::anyhow!("Failed to initialize telemetry: {}", e))?;

    tracing::info!(
        environment = %config.environment(),
        "Configuration loaded and validated successfully"
    );

    tracing::info!("Initializing storage abstraction...");
    let storage = create_storage(&config)
        .await
        .context("Failed to initialize storage")?;

    let state = Arc::new(build_state(config, storage));
    let router = routes::setup_routes(state.clone());

    Ok((state, router))
}

/// Build application state over an already constructed storage backend.
///
/// Spawns the rate-limit sweeper when `UPLOAD_RATE_CLEANUP_INTERVAL_SECS` is non-zero,
/// so it must run inside a tokio runtime.
pub fn build_state(config: Config, storage: Arc<dyn ObjectStorage>) -> AppState {
    let upload = UploadService::from_config(&config, storage);

    tracing::info!(
        max_upload_size_bytes = config.max_upload_size_bytes(),
        allowed_image_types = %config.allowed_image_types().join(","),
        upload_rate_limit = config.upload_rate_limit(),
        upload_rate_window_secs = config.upload_rate_window_secs(),
        "Upload admission configured"
    );

    let interval_secs = config.upload_rate_cleanup_interval_secs();
    let sweeper = (interval_secs > 0).then(|| {
        upload
            .rate_limiter()
            .spawn_cleanup_task(Duration::from_secs(interval_secs))
    });

    let state = AppState::new(config, upload);
    match sweeper {
        Some(handle) => state.with_rate_limit_sweeper(handle),
        None => state,
    }
}
