//! Upload Routes
//!
//! Endpoint:
//! - POST /preview-only - Store an image and render a resized preview

use axum::{
    extract::{multipart::MultipartRejection, DefaultBodyLimit, Multipart, State},
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use serde::Serialize;

use crate::state::AppState;
use crate::upload::{
    discard_staged, file_url, generate_preview, read_form, validate_form, PreviewResponse,
    UploadError, MULTIPART_OVERHEAD_BYTES,
};

// ============================================================================
// Error Response
// ============================================================================

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    code: String,
}

impl IntoResponse for UploadError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status_code();
        if let UploadError::Storage(e) = &self {
            tracing::error!("Upload storage error: {}", e);
        }

        let body = Json(ErrorResponse {
            error: self.to_string(),
            code: self.code().to_string(),
        });

        (status, body).into_response()
    }
}

// ============================================================================
// Router
// ============================================================================

/// Create the upload router. The body limit leaves room for the capped file
/// plus multipart framing.
pub fn router(max_upload_bytes: u64) -> Router<AppState> {
    let body_limit = usize::try_from(max_upload_bytes)
        .unwrap_or(usize::MAX)
        .saturating_add(MULTIPART_OVERHEAD_BYTES);

    Router::new()
        .route("/preview-only", post(preview_only))
        .layer(DefaultBodyLimit::max(body_limit))
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /preview-only
///
/// Multipart form with `file`, `complexity` and `depth`.
async fn preview_only(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<PreviewResponse>, UploadError> {
    let mut multipart = multipart.map_err(|e| {
        tracing::debug!(error = %e, "Upload is not a multipart form");
        UploadError::NoFile
    })?;

    let storage = state.storage();
    let max_bytes = state.config().uploads.max_bytes;

    let form = read_form(&mut multipart, storage, max_bytes).await?;

    let params = match validate_form(&form, max_bytes) {
        Ok(params) => params,
        Err(e) => {
            discard_staged(&form, storage).await;
            return Err(e);
        }
    };

    // validate_form only passes forms whose file was staged
    let staged = form
        .file
        .as_ref()
        .and_then(|f| f.staged_as.as_deref())
        .ok_or(UploadError::NoFile)?;

    if let Err(e) = storage.rename(staged, &params.file_name).await {
        discard_staged(&form, storage).await;
        return Err(e.into());
    }

    tracing::info!(
        file_name = %params.file_name,
        content_type = %params.content_type,
        complexity = params.complexity,
        depth = params.depth,
        "Upload stored"
    );

    let mut response = PreviewResponse {
        file_url: file_url(&params.file_name),
        preview_url: None,
        file_size_bytes: None,
        preview_width: None,
        preview_height: None,
        original_width: None,
        original_height: None,
        tokens_charged: 0,
        complexity: params.complexity,
        depth: params.depth,
    };

    if params.content_type.starts_with("image/") {
        match generate_preview(storage, &params.file_name, params.complexity).await {
            Ok(preview) => {
                response.preview_url = Some(file_url(&preview.name));
                response.preview_width = Some(preview.width);
                response.preview_height = Some(preview.height);
                response.original_width = Some(preview.original_width);
                response.original_height = Some(preview.original_height);
            }
            Err(e) => {
                tracing::warn!(
                    file_name = %params.file_name,
                    error = %e,
                    "Preview generation failed, returning upload without preview"
                );
            }
        }
    }

    response.file_size_bytes = storage
        .metadata(&params.file_name)
        .await
        .ok()
        .map(|meta| meta.size);

    Ok(Json(response))
}
