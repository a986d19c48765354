//! Upload types for the preview endpoint

use serde::Serialize;

use crate::error::StorageError;

// ============================================================================
// Constants
// ============================================================================

/// Maximum upload size: 20MB
pub const MAX_UPLOAD_BYTES: u64 = 20 * 1024 * 1024;

/// Extra request body allowance for multipart framing and text fields
pub const MULTIPART_OVERHEAD_BYTES: usize = 1024 * 1024;

/// Content types accepted by the upload endpoint
pub const ALLOWED_IMAGE_MIME: &[&str] = &[
    "image/png",
    "image/jpeg",
    "image/jpg",
    "image/webp",
    "image/gif",
];

pub const DEFAULT_COMPLEXITY: f64 = 0.5;
pub const DEFAULT_DEPTH: f64 = 5.0;

/// Previews are stored as this prefix followed by the original name
pub const PREVIEW_PREFIX: &str = "preview_";

/// Preview name derived from an original's name
pub fn preview_name(file_name: &str) -> String {
    format!("{}{}", PREVIEW_PREFIX, file_name)
}

/// Public URL of a stored file
pub fn file_url(file_name: &str) -> String {
    format!("/uploads/{}", urlencoding::encode(file_name))
}

// ============================================================================
// Request Types
// ============================================================================

/// What was learned about the `file` field while reading the form
#[derive(Debug, Clone, Default)]
pub struct FileField {
    /// Sanitized basename, `None` when the client sent nothing usable
    pub file_name: Option<String>,

    /// Declared content type, as sent
    pub content_type: Option<String>,

    /// Staging name the body was streamed to, if it was stored
    pub staged_as: Option<String>,

    /// Bytes written before the stream ended or was cut off
    pub bytes_received: u64,

    /// The body went over the upload cap and was discarded
    pub too_large: bool,
}

/// Raw form as received, before validation
#[derive(Debug, Clone, Default)]
pub struct PreviewForm {
    pub file: Option<FileField>,
    pub complexity: Option<String>,
    pub depth: Option<String>,
}

/// A fully validated upload
#[derive(Debug, Clone, PartialEq)]
pub struct PreviewParams {
    pub file_name: String,
    pub content_type: String,
    pub complexity: f64,
    pub depth: f64,
}

// ============================================================================
// Response Types
// ============================================================================

/// Response of `POST /preview-only`
#[derive(Debug, Clone, Serialize)]
pub struct PreviewResponse {
    pub file_url: String,
    pub preview_url: Option<String>,
    pub file_size_bytes: Option<u64>,
    pub preview_width: Option<u32>,
    pub preview_height: Option<u32>,
    pub original_width: Option<u32>,
    pub original_height: Option<u32>,
    /// Billing placeholder, always zero
    pub tokens_charged: u32,
    pub complexity: f64,
    pub depth: f64,
}

// ============================================================================
// Error Types
// ============================================================================

/// Upload error types
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("No file uploaded")]
    NoFile,

    #[error("Unsupported media type. Please upload an image (png/jpg/webp/gif).")]
    UnsupportedMediaType(Option<String>),

    #[error("complexity and depth must be numbers")]
    NotNumbers,

    #[error("complexity must be between 0.0 and 1.0")]
    ComplexityOutOfRange(f64),

    #[error("depth must be > 0 and <= 1000")]
    DepthOutOfRange(f64),

    #[error("File too large. Max {} MB.", .max / (1024 * 1024))]
    FileTooLarge { max: u64 },

    #[error("Malformed upload: {0}")]
    Malformed(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

impl UploadError {
    /// Get HTTP status code for this error
    pub fn status_code(&self) -> axum::http::StatusCode {
        use axum::http::StatusCode;
        match self {
            Self::NoFile => StatusCode::BAD_REQUEST,
            Self::UnsupportedMediaType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            Self::NotNumbers => StatusCode::BAD_REQUEST,
            Self::ComplexityOutOfRange(_) => StatusCode::BAD_REQUEST,
            Self::DepthOutOfRange(_) => StatusCode::BAD_REQUEST,
            Self::FileTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Malformed(_) => StatusCode::BAD_REQUEST,
            Self::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable machine-readable code for the error body
    pub fn code(&self) -> &'static str {
        match self {
            Self::NoFile => "NO_FILE",
            Self::UnsupportedMediaType(_) => "UNSUPPORTED_MEDIA_TYPE",
            Self::NotNumbers => "INVALID_NUMBER",
            Self::ComplexityOutOfRange(_) => "COMPLEXITY_OUT_OF_RANGE",
            Self::DepthOutOfRange(_) => "DEPTH_OUT_OF_RANGE",
            Self::FileTooLarge { .. } => "FILE_TOO_LARGE",
            Self::Malformed(_) => "MALFORMED_UPLOAD",
            Self::Storage(_) => "STORAGE_ERROR",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[test]
    fn test_too_large_message() {
        let err = UploadError::FileTooLarge { max: MAX_UPLOAD_BYTES };
        assert_eq!(err.to_string(), "File too large. Max 20 MB.");
        assert_eq!(err.status_code(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[test]
    fn test_urls() {
        assert_eq!(file_url("cat.png"), "/uploads/cat.png");
        assert_eq!(file_url("my cat.png"), "/uploads/my%20cat.png");
        assert_eq!(preview_name("cat.png"), "preview_cat.png");
    }
}
