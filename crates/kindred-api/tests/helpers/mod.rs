//! Test helpers: build AppState and router for integration tests.
//!
//! Run from workspace root: `cargo test -p kindred-api`. Photos are written to
//! a temporary directory through `LocalStorage`.

#![allow(dead_code)]

pub mod fixtures;

use axum_test::multipart::{MultipartForm, Part};
use axum_test::{TestResponse, TestServer};
use kindred_api::setup::{build_state, routes};
use kindred_api::AppState;
use kindred_core::{Config, PhotoServiceConfig};
use kindred_storage::LocalStorage;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

pub const USER_HEADER: &str = "x-user-id";
pub const MEDIA_BASE_URL: &str = "http://localhost:4000/media";

/// API path prefix for tests (e.g. `/api/v0`).
pub fn api_path(path: &str) -> String {
    format!("{}{}", kindred_core::constants::API_PREFIX, path)
}

/// Test application: server, state, and owned resources.
pub struct TestApp {
    pub server: TestServer,
    pub state: Arc<AppState>,
    pub _temp_dir: TempDir,
}

impl TestApp {
    pub fn client(&self) -> &TestServer {
        &self.server
    }

    /// Location on disk of an object stored under `key`.
    pub fn stored_path(&self, key: &str) -> PathBuf {
        self._temp_dir.path().join(key)
    }

    pub fn stored_file_count(&self) -> usize {
        fn count(dir: &std::path::Path) -> usize {
            std::fs::read_dir(dir)
                .map(|entries| {
                    entries
                        .filter_map(Result::ok)
                        .map(|entry| {
                            let path = entry.path();
                            if path.is_dir() {
                                count(&path)
                            } else {
                                1
                            }
                        })
                        .sum()
                })
                .unwrap_or(0)
        }
        count(self._temp_dir.path())
    }

    /// POST a single-file upload form as `user_id`.
    pub async fn upload(
        &self,
        user_id: &str,
        data: Vec<u8>,
        file_name: &str,
        mime_type: &str,
    ) -> TestResponse {
        let part = Part::bytes(bytes::Bytes::from(data))
            .file_name(file_name.to_string())
            .mime_type(mime_type.to_string());
        let multipart = MultipartForm::new().add_part("file", part);
        self.server
            .post(&api_path("/photos"))
            .add_header(USER_HEADER, user_id.to_string())
            .multipart(multipart)
            .await
    }
}

/// Setup a test application with default settings.
pub async fn setup_test_app() -> TestApp {
    setup_test_app_with(&[]).await
}

/// Setup a test application, overriding configuration variables.
pub async fn setup_test_app_with(overrides: &[(&str, &str)]) -> TestApp {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let path = temp_dir.path().to_string_lossy().to_string();

    let mut vars: HashMap<String, String> = HashMap::from([
        ("STORAGE_BACKEND".to_string(), "local".to_string()),
        ("LOCAL_STORAGE_PATH".to_string(), path.clone()),
        ("LOCAL_STORAGE_BASE_URL".to_string(), MEDIA_BASE_URL.to_string()),
        ("UPLOAD_RATE_CLEANUP_INTERVAL_SECS".to_string(), "0".to_string()),
    ]);
    for (key, value) in overrides {
        vars.insert(key.to_string(), value.to_string());
    }

    let photo_config = PhotoServiceConfig::from_lookup(|key: &str| vars.get(key).cloned())
        .expect("Invalid test configuration");
    let config = Config(Box::new(photo_config));

    let storage = LocalStorage::new(path, MEDIA_BASE_URL.to_string())
        .await
        .expect("Failed to create local storage");

    let state = Arc::new(build_state(config, Arc::new(storage)));
    let app = routes::setup_routes(state.clone());
    let server = TestServer::new(app.into_make_service()).expect("Failed to create test server");

    TestApp {
        server,
        state,
        _temp_dir: temp_dir,
    }
}
