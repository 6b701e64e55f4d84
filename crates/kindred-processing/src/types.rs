//! Types for the upload pipeline.

/// A photo upload as received from the caller, content already in memory.
#[derive(Clone, Debug)]
pub struct UploadRequest {
    pub data: Vec<u8>,
    /// Declared MIME type, possibly with parameters (`image/png; q=1`).
    pub content_type: String,
    /// Client-provided file name. Only its base feeds the storage key.
    pub file_name: Option<String>,
    /// Key prefix, `/`-separated (`photos/{user_id}`).
    pub prefix: String,
}

impl UploadRequest {
    pub fn new(data: Vec<u8>, content_type: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self {
            data,
            content_type: content_type.into(),
            file_name: None,
            prefix: prefix.into(),
        }
    }

    pub fn with_file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = Some(file_name.into());
        self
    }
}

/// Result of a successful upload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredPhoto {
    pub storage_key: String,
    pub url: String,
    pub content_type: String,
    pub size_bytes: usize,
}

/// A stored photo plus the caller's remaining uploads in the current window.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AdmittedUpload {
    pub photo: StoredPhoto,
    pub remaining: u32,
}
