//! Admin endpoints for the upload directory
//!
//! Local development only: there is no authentication in front of these.
//!
//! Endpoints:
//! - GET /admin/uploads/recent - Most recently modified stored files
//! - POST /admin/uploads/purge - Delete files older than N hours

use axum::{
    extract::{Query, State},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::retention::{hours_to_duration, sweep_older_than, CleanupSummary, SweepError};
use crate::state::AppState;
use crate::storage::StoredFile;
use crate::upload::file_url;

const DEFAULT_LIMIT: usize = 50;
const MAX_LIMIT: usize = 500;
const DEFAULT_PURGE_HOURS: f64 = 24.0;
/// 30 days
const MAX_PURGE_HOURS: f64 = 720.0;

// ============================================================================
// Request / Response Types
// ============================================================================

/// Query parameters arrive as raw strings so parse failures get our message
#[derive(Debug, Deserialize)]
pub struct RecentQuery {
    pub limit: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PurgeQuery {
    pub hours: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RecentItem {
    pub name: String,
    pub url: String,
    pub size_bytes: u64,
    pub modified_ts: f64,
    pub modified: String,
}

#[derive(Debug, Serialize)]
pub struct RecentResponse {
    pub count: usize,
    pub items: Vec<RecentItem>,
}

#[derive(Debug, Serialize)]
pub struct PurgeResponse {
    pub status: &'static str,
    pub hours: f64,
    #[serde(flatten)]
    pub summary: CleanupSummary,
}

impl From<StoredFile> for RecentItem {
    fn from(file: StoredFile) -> Self {
        Self {
            url: file_url(&file.name),
            size_bytes: file.size,
            modified_ts: file.modified_ts(),
            modified: format_modified(file.modified),
            name: file.name,
        }
    }
}

fn format_modified(modified: DateTime<Utc>) -> String {
    modified.to_rfc3339_opts(SecondsFormat::Micros, true)
}

// ============================================================================
// Router
// ============================================================================

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/recent", get(recent_uploads))
        .route("/purge", post(purge_uploads))
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /admin/uploads/recent?limit=N
async fn recent_uploads(
    State(state): State<AppState>,
    Query(query): Query<RecentQuery>,
) -> Result<Json<RecentResponse>> {
    let limit = parse_limit(query.limit.as_deref())?;

    let files = state.storage().list_files().await?;
    let items: Vec<RecentItem> = most_recent(files, limit)
        .into_iter()
        .map(RecentItem::from)
        .collect();

    Ok(Json(RecentResponse {
        count: items.len(),
        items,
    }))
}

/// POST /admin/uploads/purge?hours=H
async fn purge_uploads(
    State(state): State<AppState>,
    Query(query): Query<PurgeQuery>,
) -> Result<Json<PurgeResponse>> {
    let hours = parse_hours(query.hours.as_deref())?;
    let retention = hours_to_duration(hours).ok_or_else(hours_out_of_range)?;

    let summary = sweep_older_than(state.storage(), state.clock().now(), retention)
        .await
        .map_err(|e| match e {
            SweepError::Storage(e) => AppError::Storage(e),
            other => AppError::BadRequest(other.to_string()),
        })?;

    tracing::info!(
        hours,
        deleted = summary.deleted,
        bytes_freed = summary.bytes_freed,
        "Manual purge complete"
    );

    Ok(Json(PurgeResponse {
        status: "ok",
        hours,
        summary,
    }))
}

// ============================================================================
// Helpers
// ============================================================================

fn parse_limit(raw: Option<&str>) -> Result<usize> {
    let limit: i64 = match raw {
        None => return Ok(DEFAULT_LIMIT),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| AppError::BadRequest("limit must be an integer".to_string()))?,
    };
    if limit < 1 || limit > MAX_LIMIT as i64 {
        return Err(AppError::BadRequest(
            "limit must be between 1 and 500".to_string(),
        ));
    }
    Ok(limit as usize)
}

fn parse_hours(raw: Option<&str>) -> Result<f64> {
    let hours: f64 = match raw {
        None => return Ok(DEFAULT_PURGE_HOURS),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| AppError::BadRequest("hours must be a number".to_string()))?,
    };
    if !(hours > 0.0 && hours <= MAX_PURGE_HOURS) {
        return Err(hours_out_of_range());
    }
    Ok(hours)
}

fn hours_out_of_range() -> AppError {
    AppError::BadRequest("hours must be > 0 and <= 720".to_string())
}

/// Newest first, staging files left out, at most `limit` entries
fn most_recent(files: Vec<StoredFile>, limit: usize) -> Vec<StoredFile> {
    let mut files: Vec<StoredFile> = files.into_iter().filter(|f| !f.is_staging()).collect();
    files.sort_by(|a, b| b.modified.cmp(&a.modified));
    files.truncate(limit);
    files
}
