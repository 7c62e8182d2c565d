//! Configuration module
//!
//! `UploadSettings` carries the limits and timings the upload controller works
//! with; `Config` adds the remote endpoint and tooling paths and is loaded
//! from the environment (and an optional `.env` file).

use std::env;
use std::time::Duration;

const MAX_UPLOAD_SIZE_MB: f64 = 100.0;
const NARRATOR_INTERVAL_MS: u64 = 2500;
const METADATA_TIMEOUT_SECS: u64 = 15;
const HTTP_TIMEOUT_SECS: u64 = 0;

/// Video containers accepted when no allow-list is configured
pub const DEFAULT_ACCEPTED_EXTENSIONS: &[&str] = &[".mp4", ".mov", ".avi", ".mkv", ".webm", ".m4v"];

/// Limits and timings for one upload controller
#[derive(Clone, Debug, PartialEq)]
pub struct UploadSettings {
    /// Files above this size are rejected before any network activity
    pub max_size_mb: f64,
    /// Dot-prefixed, lowercase extensions
    pub accepted_extensions: Vec<String>,
    /// Upload-destination identifier sent with every request
    pub upload_preset: String,
    /// How often the status message rotates while an upload is in flight
    pub narrator_interval: Duration,
    /// Upper bound for local metadata extraction
    pub metadata_timeout: Duration,
}

impl Default for UploadSettings {
    fn default() -> Self {
        Self {
            max_size_mb: MAX_UPLOAD_SIZE_MB,
            accepted_extensions: DEFAULT_ACCEPTED_EXTENSIONS
                .iter()
                .map(|e| e.to_string())
                .collect(),
            upload_preset: String::new(),
            narrator_interval: Duration::from_millis(NARRATOR_INTERVAL_MS),
            metadata_timeout: Duration::from_secs(METADATA_TIMEOUT_SECS),
        }
    }
}

impl UploadSettings {
    pub fn with_preset(upload_preset: impl Into<String>) -> Self {
        Self {
            upload_preset: upload_preset.into(),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.upload_preset.trim().is_empty() {
            return Err(anyhow::anyhow!("LECTERN_UPLOAD_PRESET must not be empty"));
        }

        if !(self.max_size_mb.is_finite() && self.max_size_mb > 0.0) {
            return Err(anyhow::anyhow!(
                "MAX_UPLOAD_SIZE_MB must be a positive number"
            ));
        }

        if self.accepted_extensions.is_empty() {
            return Err(anyhow::anyhow!(
                "ACCEPTED_EXTENSIONS must list at least one extension"
            ));
        }

        if self.narrator_interval.is_zero() {
            return Err(anyhow::anyhow!("NARRATOR_INTERVAL_MS must be greater than 0"));
        }

        if self.metadata_timeout.is_zero() {
            return Err(anyhow::anyhow!(
                "METADATA_TIMEOUT_SECS must be greater than 0"
            ));
        }

        Ok(())
    }
}

/// Normalize a comma-separated extension list to `.ext` lowercase entries
pub fn parse_extensions(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().trim_start_matches('.').to_lowercase())
        .filter(|s| !s.is_empty())
        .map(|s| format!(".{}", s))
        .collect()
}

/// Application configuration
#[derive(Clone, Debug)]
pub struct Config {
    /// Remote media upload endpoint
    pub upload_url: String,
    pub settings: UploadSettings,
    pub ffprobe_path: String,
    /// 0 disables the client-side timeout
    pub http_timeout_secs: u64,
    pub environment: String,
}

impl Config {
    /// Check if the application is running in production mode
    pub fn is_production(&self) -> bool {
        let environment = self.environment.to_lowercase();
        environment == "production" || environment == "prod"
    }

    pub fn http_timeout(&self) -> Option<Duration> {
        (self.http_timeout_secs > 0).then(|| Duration::from_secs(self.http_timeout_secs))
    }

    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let environment = env::var("ENVIRONMENT")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string());

        let upload_url = env::var("LECTERN_UPLOAD_URL")
            .map_err(|_| anyhow::anyhow!("LECTERN_UPLOAD_URL must be set"))?;

        let upload_preset = env::var("LECTERN_UPLOAD_PRESET")
            .map_err(|_| anyhow::anyhow!("LECTERN_UPLOAD_PRESET must be set"))?;

        let max_size_mb = env::var("MAX_UPLOAD_SIZE_MB")
            .ok()
            .and_then(|s| s.trim().parse::<f64>().ok())
            .unwrap_or(MAX_UPLOAD_SIZE_MB);

        let accepted_extensions = env::var("ACCEPTED_EXTENSIONS")
            .map(|raw| parse_extensions(&raw))
            .unwrap_or_else(|_| parse_extensions(&DEFAULT_ACCEPTED_EXTENSIONS.join(",")));

        let narrator_interval_ms = env::var("NARRATOR_INTERVAL_MS")
            .unwrap_or_else(|_| NARRATOR_INTERVAL_MS.to_string())
            .parse()
            .unwrap_or(NARRATOR_INTERVAL_MS);

        let metadata_timeout_secs = env::var("METADATA_TIMEOUT_SECS")
            .unwrap_or_else(|_| METADATA_TIMEOUT_SECS.to_string())
            .parse()
            .unwrap_or(METADATA_TIMEOUT_SECS);

        let config = Config {
            upload_url: upload_url.trim().to_string(),
            settings: UploadSettings {
                max_size_mb,
                accepted_extensions,
                upload_preset: upload_preset.trim().to_string(),
                narrator_interval: Duration::from_millis(narrator_interval_ms),
                metadata_timeout: Duration::from_secs(metadata_timeout_secs),
            },
            ffprobe_path: env::var("FFPROBE_PATH")
                .ok()
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| "ffprobe".to_string()),
            http_timeout_secs: env::var("HTTP_TIMEOUT_SECS")
                .unwrap_or_else(|_| HTTP_TIMEOUT_SECS.to_string())
                .parse()
                .unwrap_or(HTTP_TIMEOUT_SECS),
            environment,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if !(self.upload_url.starts_with("https://") || self.upload_url.starts_with("http://")) {
            return Err(anyhow::anyhow!(
                "LECTERN_UPLOAD_URL must be an http(s) URL"
            ));
        }

        if self.is_production() && !self.upload_url.starts_with("https://") {
            return Err(anyhow::anyhow!(
                "LECTERN_UPLOAD_URL must use https in production"
            ));
        }

        if self.ffprobe_path.trim().is_empty() {
            return Err(anyhow::anyhow!("FFPROBE_PATH must not be empty"));
        }

        self.settings.validate()
    }
}
