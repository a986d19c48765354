//! Application state management

use std::sync::Arc;

use crate::clock::Clock;
use crate::config::Config;
use crate::storage::UploadStorage;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: Config,
    storage: Arc<dyn UploadStorage>,
    clock: Arc<dyn Clock>,
}

impl AppState {
    /// Create a new application state
    pub fn new(config: Config, storage: Arc<dyn UploadStorage>, clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                config,
                storage,
                clock,
            }),
        }
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Get the upload storage backend
    pub fn storage(&self) -> &dyn UploadStorage {
        self.inner.storage.as_ref()
    }

    /// Get the clock used for retention cutoffs
    pub fn clock(&self) -> &dyn Clock {
        self.inner.clock.as_ref()
    }
}
