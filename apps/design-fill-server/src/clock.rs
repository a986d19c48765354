//! Time sources and sleep primitives
//!
//! The retention sweeper and the in-memory storage backend take their notion
//! of "now" from a [`Clock`], and the sweeper waits between runs through a
//! [`Sleeper`]. Production wires in [`SystemClock`] and [`TokioSleeper`];
//! tests use [`ManualClock`] and [`ManualSleeper`] to move time forward
//! without waiting on real timers.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

/// Source of the current wall-clock time
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Something the sweeper can wait on between runs
#[async_trait::async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

// ============================================================================
// Production implementations
// ============================================================================

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait::async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

// ============================================================================
// Manual implementations
// ============================================================================

/// Clock that only moves when told to
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn advance(&self, by: chrono::Duration) {
        let mut now = self.now.lock();
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}

/// Sleeper that advances a [`ManualClock`] instead of waiting
#[derive(Debug)]
pub struct ManualSleeper {
    clock: Arc<ManualClock>,
    naps: AtomicUsize,
}

impl ManualSleeper {
    pub fn new(clock: Arc<ManualClock>) -> Self {
        Self {
            clock,
            naps: AtomicUsize::new(0),
        }
    }

    /// Number of sleeps performed so far
    pub fn naps(&self) -> usize {
        self.naps.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl Sleeper for ManualSleeper {
    async fn sleep(&self, duration: Duration) {
        let step = chrono::Duration::from_std(duration)
            .unwrap_or_else(|_| chrono::Duration::days(365 * 100));
        self.clock.advance(step);
        self.naps.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;
    }
}
