//! File serving routes
//!
//! Serves stored originals and previews from the upload storage.

use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, StatusCode},
    response::Response,
    routing::get,
    Router,
};

use crate::error::{AppError, Result};
use crate::state::AppState;
use crate::storage::{is_staging_name, sanitize_file_name};

/// Create the files router
pub fn router() -> Router<AppState> {
    Router::new().route("/:name", get(serve_file))
}

/// Serve a stored file
async fn serve_file(State(state): State<AppState>, Path(name): Path<String>) -> Result<Response> {
    // Only bare names inside the upload directory, never in-flight uploads
    if sanitize_file_name(&name).as_deref() != Some(name.as_str()) || is_staging_name(&name) {
        return Err(AppError::NotFound(format!("File not found: {}", name)));
    }

    let data = state.storage().read(&name).await?;
    let content_type = mime_guess::from_path(&name).first_or_octet_stream();

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type.as_ref())
        .header(header::CONTENT_LENGTH, data.len())
        .header(header::CACHE_CONTROL, "public, max-age=3600")
        .body(Body::from(data))
        .map_err(|e| AppError::Internal(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::config::Config;
    use crate::storage::{MemoryStorage, UploadStorage};
    use axum::http::Request;
    use std::sync::Arc;
    use tower::ServiceExt;

    async fn app() -> (Router, MemoryStorage) {
        let clock = Arc::new(ManualClock::new(chrono::Utc::now()));
        let storage = MemoryStorage::new(clock.clone());
        storage.write("cat.png", b"meow").await.unwrap();
        storage.write(".upload-1.part", b"partial").await.unwrap();
        let state = AppState::new(Config::default(), Arc::new(storage.clone()), clock);
        (Router::new().nest("/uploads", router()).with_state(state), storage)
    }

    async fn get(app: Router, uri: &str) -> Response {
        app.oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_serves_stored_file() {
        let (app, _storage) = app().await;
        let resp = get(app, "/uploads/cat.png").await;

        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()[header::CONTENT_TYPE], "image/png");
        assert_eq!(resp.headers()[header::CONTENT_LENGTH], "4");
    }

    #[tokio::test]
    async fn test_missing_and_hidden_files_are_not_found() {
        let (app, _storage) = app().await;
        for uri in ["/uploads/dog.png", "/uploads/.upload-1.part", "/uploads/..%2Fcat.png"] {
            let resp = get(app.clone(), uri).await;
            assert_eq!(resp.status(), StatusCode::NOT_FOUND, "{uri}");
        }
    }
}
