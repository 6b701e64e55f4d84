//! Content signature (magic number) checks for the supported photo formats.
//!
//! The declared MIME type of an upload comes from the client and cannot be
//! trusted; the leading bytes of the payload must match a signature
//! registered for that type.

use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

const JPEG_SIGNATURES: &[&[u8]] = &[&[0xFF, 0xD8, 0xFF]];

const PNG_SIGNATURES: &[&[u8]] = &[&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]];

// "RIFF" container header.
const WEBP_SIGNATURES: &[&[u8]] = &[&[0x52, 0x49, 0x46, 0x46]];

// ISO-BMFF `ftyp` box with major brand `avif`, box sizes 0x1C and 0x20.
const AVIF_SIGNATURES: &[&[u8]] = &[
    &[
        0x00, 0x00, 0x00, 0x1C, 0x66, 0x74, 0x79, 0x70, 0x61, 0x76, 0x69, 0x66,
    ],
    &[
        0x00, 0x00, 0x00, 0x20, 0x66, 0x74, 0x79, 0x70, 0x61, 0x76, 0x69, 0x66,
    ],
];

/// Image formats accepted for member photos.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageFormat {
    Jpeg,
    Png,
    Webp,
    Avif,
}

impl ImageFormat {
    pub const ALL: [ImageFormat; 4] = [
        ImageFormat::Jpeg,
        ImageFormat::Png,
        ImageFormat::Webp,
        ImageFormat::Avif,
    ];

    pub fn mime_type(&self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "image/jpeg",
            ImageFormat::Png => "image/png",
            ImageFormat::Webp => "image/webp",
            ImageFormat::Avif => "image/avif",
        }
    }

    /// Extension used in storage keys.
    pub fn extension(&self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "jpg",
            ImageFormat::Png => "png",
            ImageFormat::Webp => "webp",
            ImageFormat::Avif => "avif",
        }
    }

    /// Look up a format by exact MIME type (`image/png`).
    pub fn from_mime_type(mime_type: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.mime_type() == mime_type)
    }

    pub fn signatures(&self) -> &'static [&'static [u8]] {
        match self {
            ImageFormat::Jpeg => JPEG_SIGNATURES,
            ImageFormat::Png => PNG_SIGNATURES,
            ImageFormat::Webp => WEBP_SIGNATURES,
            ImageFormat::Avif => AVIF_SIGNATURES,
        }
    }

    /// True if `buffer` starts with at least one registered signature.
    ///
    /// A buffer shorter than a signature never matches it.
    pub fn matches(&self, buffer: &[u8]) -> bool {
        self.signatures()
            .iter()
            .any(|signature| buffer.starts_with(signature))
    }
}

impl FromStr for ImageFormat {
    type Err = String;

    /// Accepts either a short name (`jpeg`, `jpg`, `png`, `webp`, `avif`) or a MIME type.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase();
        match normalized.as_str() {
            "jpeg" | "jpg" => Ok(ImageFormat::Jpeg),
            "png" => Ok(ImageFormat::Png),
            "webp" => Ok(ImageFormat::Webp),
            "avif" => Ok(ImageFormat::Avif),
            other => {
                Self::from_mime_type(other).ok_or_else(|| format!("Unsupported image type: {}", s))
            }
        }
    }
}

impl Display for ImageFormat {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.mime_type())
    }
}

/// Check `buffer` against the signatures registered for `expected_type`.
///
/// Fails closed: an unknown type is never valid.
pub fn validate_file_content(buffer: &[u8], expected_type: &str) -> bool {
    expected_type
        .parse::<ImageFormat>()
        .map(|format| format.matches(buffer))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    const JPEG: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, 0x4A, 0x46];
    const PNG: &[u8] = &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00];
    const WEBP: &[u8] = b"RIFF\x24\x00\x00\x00WEBPVP8 ";
    const AVIF: &[u8] = &[
        0x00, 0x00, 0x00, 0x20, 0x66, 0x74, 0x79, 0x70, 0x61, 0x76, 0x69, 0x66, 0x00, 0x00,
    ];

    #[test]
    fn test_each_format_matches_its_own_signature() {
        assert!(ImageFormat::Jpeg.matches(JPEG));
        assert!(ImageFormat::Png.matches(PNG));
        assert!(ImageFormat::Webp.matches(WEBP));
        assert!(ImageFormat::Avif.matches(AVIF));
    }

    #[test]
    fn test_jpeg_bytes_declared_as_png_fail() {
        assert!(validate_file_content(JPEG, "image/jpeg"));
        assert!(!validate_file_content(JPEG, "image/png"));
    }

    #[test]
    fn test_formats_do_not_cross_match() {
        let samples = [JPEG, PNG, WEBP, AVIF];
        for (i, format) in ImageFormat::ALL.iter().enumerate() {
            for (j, sample) in samples.iter().enumerate() {
                assert_eq!(format.matches(sample), i == j, "{} vs sample {}", format, j);
            }
        }
    }

    #[test]
    fn test_short_buffer_fails_without_panicking() {
        assert!(!ImageFormat::Png.matches(&[0x89, 0x50]));
        assert!(!ImageFormat::Jpeg.matches(&[]));
        assert!(!validate_file_content(&[0xFF], "jpeg"));
    }

    #[test]
    fn test_avif_small_ftyp_box() {
        let avif_1c = [
            0x00, 0x00, 0x00, 0x1C, 0x66, 0x74, 0x79, 0x70, 0x61, 0x76, 0x69, 0x66,
        ];
        assert!(validate_file_content(&avif_1c, "avif"));
    }

    #[test]
    fn test_unregistered_type_fails_closed() {
        assert!(!validate_file_content(JPEG, "image/gif"));
        assert!(!validate_file_content(b"GIF89a", "gif"));
        assert!(!validate_file_content(JPEG, ""));
    }

    #[test]
    fn test_parse_short_names_and_mime_types() {
        assert_eq!("jpg".parse::<ImageFormat>(), Ok(ImageFormat::Jpeg));
        assert_eq!("IMAGE/WEBP".parse::<ImageFormat>(), Ok(ImageFormat::Webp));
        assert!("image/svg+xml".parse::<ImageFormat>().is_err());
        assert_eq!(ImageFormat::from_mime_type("image/avif"), Some(ImageFormat::Avif));
    }
}
