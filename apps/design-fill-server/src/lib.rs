//! Design Fill Server Library
//!
//! A local image upload service: stores uploads in one directory, renders
//! resized previews next to them, and sweeps out files past their retention.
//! The binary in main.rs wires these pieces to the disk and the real clock;
//! tests wire them to the in-memory backend and a manual clock.
//!
//! # Modules
//!
//! - `storage`: Upload directory abstraction (local disk, in-memory)
//! - `upload`: Multipart intake, validation and preview rendering
//! - `retention`: Age-based sweeping, periodic and on demand
//! - `routes`: HTTP handlers

pub mod clock;
pub mod config;
pub mod error;
pub mod retention;
pub mod routes;
pub mod state;
pub mod storage;
pub mod upload;

use axum::http::HeaderValue;
use axum::Router;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use config::CorsConfig;
use state::AppState;

/// Build the full application router
pub fn build_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config().cors);
    let max_upload_bytes = state.config().uploads.max_bytes;

    Router::new()
        .merge(routes::health::router())
        .merge(routes::preview::router(max_upload_bytes))
        .nest("/admin/uploads", routes::admin::router())
        .nest("/uploads", routes::files::router())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// CORS restricted to the configured origins, any method and header
fn cors_layer(config: &CorsConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(Any)
        .allow_headers(Any)
}
