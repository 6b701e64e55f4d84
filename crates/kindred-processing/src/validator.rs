use crate::signature::ImageFormat;

/// Rejections raised before a photo reaches storage
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("Empty file")]
    EmptyFile,

    #[error("File too large: {size} bytes (max: {max} bytes)")]
    FileTooLarge { size: usize, max: usize },

    #[error("Invalid content type: {content_type} (allowed: {allowed:?})")]
    UnsupportedContentType {
        content_type: String,
        allowed: Vec<String>,
    },

    #[error("Declared type {content_type} does not match actual content")]
    ContentMismatch { content_type: String },

    #[error("Invalid storage prefix: {0}")]
    InvalidPrefix(String),
}

/// Strip MIME parameters and lowercase: `Image/PNG; charset=x` gives `image/png`.
pub fn normalize_mime_type(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_lowercase()
}

/// Photo validator
///
/// Checks size, declared type and content signature. Holds no storage
/// details so it can run before any I/O.
#[derive(Clone, Debug)]
pub struct UploadValidator {
    max_file_size: usize,
    allowed_formats: Vec<ImageFormat>,
}

impl UploadValidator {
    pub fn new(max_file_size: usize, allowed_formats: Vec<ImageFormat>) -> Self {
        Self {
            max_file_size,
            allowed_formats,
        }
    }

    /// Build from MIME strings as found in configuration. Unknown entries are skipped.
    pub fn from_content_types(max_file_size: usize, content_types: &[String]) -> Self {
        let allowed_formats = content_types
            .iter()
            .filter_map(|t| ImageFormat::from_mime_type(&normalize_mime_type(t)))
            .collect();
        Self::new(max_file_size, allowed_formats)
    }

    pub fn max_file_size(&self) -> usize {
        self.max_file_size
    }

    pub fn allowed_formats(&self) -> &[ImageFormat] {
        &self.allowed_formats
    }

    /// Validate file size
    pub fn validate_file_size(&self, size: usize) -> Result<(), ValidationError> {
        if size == 0 {
            return Err(ValidationError::EmptyFile);
        }

        if size > self.max_file_size {
            return Err(ValidationError::FileTooLarge {
                size,
                max: self.max_file_size,
            });
        }

        Ok(())
    }

    /// Resolve the declared type to an allowed format.
    pub fn validate_content_type(&self, content_type: &str) -> Result<ImageFormat, ValidationError> {
        let normalized = normalize_mime_type(content_type);

        ImageFormat::from_mime_type(&normalized)
            .filter(|format| self.allowed_formats.contains(format))
            .ok_or_else(|| ValidationError::UnsupportedContentType {
                content_type: normalized,
                allowed: self
                    .allowed_formats
                    .iter()
                    .map(|f| f.mime_type().to_string())
                    .collect(),
            })
    }

    /// Check the payload's leading bytes against the format's signatures.
    pub fn validate_content(&self, format: ImageFormat, data: &[u8]) -> Result<(), ValidationError> {
        if format.matches(data) {
            Ok(())
        } else {
            Err(ValidationError::ContentMismatch {
                content_type: format.mime_type().to_string(),
            })
        }
    }

    /// Validate all aspects of a photo, in order: size, declared type, signature.
    pub fn validate_all(&self, content_type: &str, data: &[u8]) -> Result<ImageFormat, ValidationError> {
        self.validate_file_size(data.len())?;
        let format = self.validate_content_type(content_type)?;
        self.validate_content(format, data)?;
        Ok(format)
    }
}
