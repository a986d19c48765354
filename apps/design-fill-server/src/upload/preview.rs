//! Preview rendering
//!
//! Produces a shrunken copy of an uploaded image next to the original. This
//! is an enhancement on top of the upload: every failure is reported as a
//! [`PreviewError`] and the handler carries on without a preview.

use std::io::Cursor;

use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat};

use super::types::preview_name;
use crate::error::StorageError;
use crate::storage::UploadStorage;

/// Bounding box side at complexity 0.5
const BASE_EDGE: f64 = 512.0;
const MIN_EDGE: i64 = 64;
const MAX_EDGE: i64 = 2048;

/// Why a preview could not be produced
#[derive(Debug, thiserror::Error)]
pub enum PreviewError {
    #[error("Could not read original: {0}")]
    Storage(#[from] StorageError),

    #[error("Could not decode image: {0}")]
    Decode(#[source] image::ImageError),

    #[error("No preview format for {0:?}")]
    UnsupportedFormat(String),

    #[error("Could not encode preview: {0}")]
    Encode(#[source] image::ImageError),

    #[error("Render task failed: {0}")]
    Task(String),
}

/// Encoded preview plus the dimensions before and after shrinking
#[derive(Debug)]
pub struct RenderedPreview {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub original_width: u32,
    pub original_height: u32,
}

/// A preview that has been stored
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewOutcome {
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub original_width: u32,
    pub original_height: u32,
}

/// Side of the square the preview must fit in
pub fn preview_edge(complexity: f64) -> u32 {
    let edge = (BASE_EDGE * (0.5 + complexity)) as i64;
    edge.clamp(MIN_EDGE, MAX_EDGE) as u32
}

/// Decode `data`, shrink it into an `edge` x `edge` box and encode it in the
/// format implied by `file_name`.
///
/// Images already inside the box keep their size.
pub fn render_preview(data: &[u8], file_name: &str, edge: u32) -> Result<RenderedPreview, PreviewError> {
    let format = ImageFormat::from_path(file_name)
        .map_err(|_| PreviewError::UnsupportedFormat(file_name.to_string()))?;

    let img = image::load_from_memory(data).map_err(PreviewError::Decode)?;
    let (original_width, original_height) = (img.width(), img.height());

    let img = if original_width > edge || original_height > edge {
        img.resize(edge, edge, FilterType::Lanczos3)
    } else {
        img
    };
    let img = normalize_color(img, format);

    let mut output = Vec::new();
    img.write_to(&mut Cursor::new(&mut output), format)
        .map_err(PreviewError::Encode)?;

    Ok(RenderedPreview {
        data: output,
        width: img.width(),
        height: img.height(),
        original_width,
        original_height,
    })
}

/// Convert to a pixel layout the encoder for `format` accepts
fn normalize_color(img: DynamicImage, format: ImageFormat) -> DynamicImage {
    match (format, img) {
        (ImageFormat::Jpeg, img @ DynamicImage::ImageRgb8(_)) => img,
        (ImageFormat::Jpeg, img) => DynamicImage::ImageRgb8(img.to_rgb8()),
        (_, img @ (DynamicImage::ImageRgb8(_) | DynamicImage::ImageRgba8(_))) => img,
        (_, img) if img.color().has_alpha() => DynamicImage::ImageRgba8(img.to_rgba8()),
        (_, img) => DynamicImage::ImageRgb8(img.to_rgb8()),
    }
}

/// Render and store the preview of a stored original
pub async fn generate_preview(
    storage: &dyn UploadStorage,
    file_name: &str,
    complexity: f64,
) -> Result<PreviewOutcome, PreviewError> {
    let data = storage.read(file_name).await?;
    let edge = preview_edge(complexity);

    let name = file_name.to_string();
    let rendered = tokio::task::spawn_blocking(move || render_preview(&data, &name, edge))
        .await
        .map_err(|e| PreviewError::Task(e.to_string()))??;

    let name = preview_name(file_name);
    storage.write(&name, &rendered.data).await?;

    tracing::debug!(
        original = %file_name,
        preview = %name,
        edge,
        width = rendered.width,
        height = rendered.height,
        "Preview stored"
    );

    Ok(PreviewOutcome {
        name,
        width: rendered.width,
        height: rendered.height,
        original_width: rendered.original_width,
        original_height: rendered.original_height,
    })
}

// ============================================================================
// Tests
// ============================================================================
