//! Configuration management for the Design Fill server

use serde::Deserialize;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::retention::hours_to_duration;
use crate::upload::MAX_UPLOAD_BYTES;

const DEFAULT_ALLOWED_ORIGINS: &str = "http://localhost:3000,http://127.0.0.1:3000";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub uploads: UploadConfig,
    pub cors: CorsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UploadConfig {
    /// Directory holding originals and previews
    pub dir: PathBuf,
    /// Age in hours after which the sweeper deletes a file
    pub retention_hours: f64,
    /// Seconds between two sweeps
    pub sweep_interval_secs: u64,
    /// Hard cap on a single upload
    pub max_bytes: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
}

/// Error raised when an environment variable holds an unusable value
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8000,
            },
            uploads: UploadConfig {
                dir: PathBuf::from("uploads"),
                retention_hours: 24.0,
                sweep_interval_secs: 3600,
                max_bytes: MAX_UPLOAD_BYTES,
            },
            cors: CorsConfig {
                allowed_origins: parse_origins(DEFAULT_ALLOWED_ORIGINS),
            },
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let origins = env::var("ALLOWED_ORIGINS")
            .or_else(|_| env::var("FRONTEND_URL"))
            .unwrap_or_else(|_| DEFAULT_ALLOWED_ORIGINS.to_string());

        let max_upload_mb: u64 = parse_var("MAX_UPLOAD_MB", 20)?;

        Ok(Config {
            server: ServerConfig {
                host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: parse_var("SERVER_PORT", 8000)?,
            },
            uploads: UploadConfig {
                dir: env::var("UPLOAD_DIR")
                    .map(PathBuf::from)
                    .unwrap_or_else(|_| PathBuf::from("uploads")),
                retention_hours: parse_retention_hours("RETENTION_HOURS", 24.0)?,
                sweep_interval_secs: parse_var("SWEEP_INTERVAL_SECS", 3600)?,
                max_bytes: max_upload_mb * 1024 * 1024,
            },
            cors: CorsConfig {
                allowed_origins: parse_origins(&origins),
            },
        })
    }
}

impl UploadConfig {
    /// Retention as a signed duration, for cutoff arithmetic. `None` when
    /// `retention_hours` is not a usable number of hours.
    pub fn retention(&self) -> Option<chrono::Duration> {
        hours_to_duration(self.retention_hours)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

fn parse_var<T: std::str::FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value }),
        Err(_) => Ok(default),
    }
}

/// Retention must be a positive, finite number of hours within range
fn parse_retention_hours(key: &'static str, default: f64) -> Result<f64, ConfigError> {
    let hours: f64 = parse_var(key, default)?;
    if hours > 0.0 && hours_to_duration(hours).is_some() {
        Ok(hours)
    } else {
        Err(ConfigError::Invalid {
            key,
            value: hours.to_string(),
        })
    }
}

/// Split a comma-separated origin list, dropping blanks
pub fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|o| !o.is_empty())
        .map(str::to_string)
        .collect()
}
