//! Application state shared across handlers.

use kindred_core::Config;
use kindred_processing::UploadService;
use tokio::task::JoinHandle;

pub struct AppState {
    pub config: Config,
    pub upload: UploadService,
    /// Background sweep of expired rate-limit buckets, if enabled.
    rate_limit_sweeper: Option<JoinHandle<()>>,
}

impl AppState {
    pub fn new(config: Config, upload: UploadService) -> Self {
        Self {
            config,
            upload,
            rate_limit_sweeper: None,
        }
    }

    pub fn with_rate_limit_sweeper(mut self, handle: JoinHandle<()>) -> Self {
        self.rate_limit_sweeper = Some(handle);
        self
    }

    pub fn rate_limit_sweeper(&self) -> Option<&JoinHandle<()>> {
        self.rate_limit_sweeper.as_ref()
    }

    /// Body limit for upload requests: the photo ceiling plus multipart overhead.
    pub fn upload_body_limit(&self) -> usize {
        self.config.max_upload_size_bytes() + MULTIPART_OVERHEAD_BYTES
    }
}

/// Allowance for multipart boundaries, part headers and text fields.
pub const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;
