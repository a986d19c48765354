//! Storage types

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Prefix of the hidden names in-flight uploads are streamed to
pub const STAGING_PREFIX: &str = ".upload-";

/// Suffix of staging names
pub const STAGING_SUFFIX: &str = ".part";

/// Metadata about a regular file in the upload directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredFile {
    pub name: String,
    pub size: u64,
    pub modified: DateTime<Utc>,
}

impl StoredFile {
    /// Modification time as fractional seconds since the Unix epoch
    pub fn modified_ts(&self) -> f64 {
        self.modified.timestamp_micros() as f64 / 1_000_000.0
    }

    pub fn is_staging(&self) -> bool {
        is_staging_name(&self.name)
    }
}

/// Fresh staging name for one upload
pub fn staging_name() -> String {
    format!("{}{}{}", STAGING_PREFIX, uuid::Uuid::new_v4(), STAGING_SUFFIX)
}

pub fn is_staging_name(name: &str) -> bool {
    name.starts_with(STAGING_PREFIX) && name.ends_with(STAGING_SUFFIX)
}

/// Reduce a client-supplied file name to its final path component.
///
/// Both `/` and `\` count as separators. Returns `None` when nothing usable
/// is left (empty, `.` or `..`).
pub fn sanitize_file_name(raw: &str) -> Option<String> {
    let base = raw.rsplit(['/', '\\']).next().unwrap_or("").trim();
    match base {
        "" | "." | ".." => None,
        _ => Some(base.to_string()),
    }
}
