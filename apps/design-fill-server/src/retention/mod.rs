//! Retention sweeping
//!
//! Deletes stored files once they are older than a retention threshold. The
//! same routine backs the periodic [`RetentionSweeper`] and the admin purge
//! endpoint.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::clock::{Clock, Sleeper};
use crate::error::StorageError;
use crate::storage::UploadStorage;

/// Longest retention accepted: 100 years
pub const MAX_RETENTION_HOURS: f64 = 24.0 * 365.0 * 100.0;

/// Result of one sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CleanupSummary {
    pub deleted: u64,
    pub bytes_freed: u64,
}

/// Why a sweep could not run
#[derive(Debug, thiserror::Error)]
pub enum SweepError {
    #[error("Retention must not be negative, got {0}")]
    NegativeRetention(chrono::Duration),

    #[error("Retention {0} reaches past the earliest representable time")]
    CutoffOutOfRange(chrono::Duration),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Convert fractional hours to a duration with millisecond precision.
///
/// `None` for NaN, infinities and anything longer than
/// [`MAX_RETENTION_HOURS`] in either direction.
pub fn hours_to_duration(hours: f64) -> Option<chrono::Duration> {
    if !hours.is_finite() || hours.abs() > MAX_RETENTION_HOURS {
        return None;
    }
    Some(chrono::Duration::milliseconds((hours * 3_600_000.0) as i64))
}

/// Delete every regular file modified strictly before `now - retention`.
///
/// A file that cannot be deleted is logged and skipped. Only a failure to
/// list the directory, or a retention that yields no valid cutoff, fails the
/// sweep.
pub async fn sweep_older_than(
    storage: &dyn UploadStorage,
    now: DateTime<Utc>,
    retention: chrono::Duration,
) -> Result<CleanupSummary, SweepError> {
    if retention < chrono::Duration::zero() {
        return Err(SweepError::NegativeRetention(retention));
    }
    let cutoff = now
        .checked_sub_signed(retention)
        .ok_or(SweepError::CutoffOutOfRange(retention))?;
    let mut summary = CleanupSummary::default();

    for file in storage.list_files().await? {
        if file.modified >= cutoff {
            continue;
        }
        match storage.delete(&file.name).await {
            Ok(()) => {
                summary.deleted += 1;
                summary.bytes_freed += file.size;
            }
            Err(e) => {
                tracing::warn!(file = %file.name, error = %e, "Skipping file that could not be deleted");
            }
        }
    }

    Ok(summary)
}

// ============================================================================
// Periodic Sweeper
// ============================================================================

/// Background job that sweeps, sleeps for the interval, and repeats
pub struct RetentionSweeper {
    storage: Arc<dyn UploadStorage>,
    clock: Arc<dyn Clock>,
    sleeper: Arc<dyn Sleeper>,
    retention: chrono::Duration,
    interval: Duration,
}

impl RetentionSweeper {
    pub fn new(
        storage: Arc<dyn UploadStorage>,
        clock: Arc<dyn Clock>,
        sleeper: Arc<dyn Sleeper>,
        retention: chrono::Duration,
        interval: Duration,
    ) -> Self {
        Self {
            storage,
            clock,
            sleeper,
            retention,
            interval,
        }
    }

    /// One sweep with the configured retention
    pub async fn sweep_once(&self) -> Result<CleanupSummary, SweepError> {
        sweep_older_than(self.storage.as_ref(), self.clock.now(), self.retention).await
    }

    /// Sweep, then sleep for the interval.
    ///
    /// Returns the summary, or `None` when the sweep failed as a whole.
    pub async fn tick(&self) -> Option<CleanupSummary> {
        let outcome = match self.sweep_once().await {
            Ok(summary) => {
                if summary.deleted > 0 {
                    tracing::info!(
                        deleted = summary.deleted,
                        bytes_freed = summary.bytes_freed,
                        "Retention sweep removed expired uploads"
                    );
                } else {
                    tracing::debug!("Retention sweep found nothing to remove");
                }
                Some(summary)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Retention sweep failed, retrying next interval");
                None
            }
        };

        self.sleeper.sleep(self.interval).await;
        outcome
    }

    /// Run for as long as the process lives
    pub async fn run(self) {
        tracing::info!(
            retention_hours = self.retention.num_minutes() as f64 / 60.0,
            interval_secs = self.interval.as_secs(),
            "Retention sweeper started"
        );
        loop {
            self.tick().await;
        }
    }

    /// Start background sweep task
    pub fn spawn(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(self.run())
    }
}

// ============================================================================
// Tests
// ============================================================================
