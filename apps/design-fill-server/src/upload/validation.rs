//! Upload validation
//!
//! Checks run in a fixed order and the first failure wins, whatever order
//! the multipart fields arrived in:
//!
//! 1. a usable file name
//! 2. an allowed image content type
//! 3. `complexity` and `depth` parse as numbers
//! 4. `complexity` in `[0, 1]`, `depth` in `(0, 1000]`
//! 5. the body stayed under the size cap

use super::types::{
    PreviewForm, PreviewParams, UploadError, ALLOWED_IMAGE_MIME, DEFAULT_COMPLEXITY,
    DEFAULT_DEPTH,
};

pub const MIN_COMPLEXITY: f64 = 0.0;
pub const MAX_COMPLEXITY: f64 = 1.0;
pub const MAX_DEPTH: f64 = 1000.0;

/// Whether a declared content type is one of the accepted image types
pub fn is_allowed_image(content_type: &str) -> bool {
    let normalized = content_type.trim().to_ascii_lowercase();
    ALLOWED_IMAGE_MIME.contains(&normalized.as_str())
}

/// Validate a received form
pub fn validate_form(form: &PreviewForm, max_bytes: u64) -> Result<PreviewParams, UploadError> {
    let file = form.file.as_ref().ok_or(UploadError::NoFile)?;
    let file_name = file.file_name.clone().ok_or(UploadError::NoFile)?;

    let content_type = match file.content_type.as_deref() {
        Some(ct) if is_allowed_image(ct) => ct.trim().to_ascii_lowercase(),
        other => return Err(UploadError::UnsupportedMediaType(other.map(str::to_string))),
    };

    let complexity = parse_number(form.complexity.as_deref(), DEFAULT_COMPLEXITY)?;
    let depth = parse_number(form.depth.as_deref(), DEFAULT_DEPTH)?;

    if !(MIN_COMPLEXITY..=MAX_COMPLEXITY).contains(&complexity) {
        return Err(UploadError::ComplexityOutOfRange(complexity));
    }
    if !(depth > 0.0 && depth <= MAX_DEPTH) {
        return Err(UploadError::DepthOutOfRange(depth));
    }

    if file.too_large {
        return Err(UploadError::FileTooLarge { max: max_bytes });
    }

    Ok(PreviewParams {
        file_name,
        content_type,
        complexity,
        depth,
    })
}

fn parse_number(raw: Option<&str>, default: f64) -> Result<f64, UploadError> {
    match raw {
        None => Ok(default),
        Some(value) => value.trim().parse().map_err(|_| UploadError::NotNumbers),
    }
}
