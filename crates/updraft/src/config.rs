use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use updraft_core::Url;

/// Longest supported gap between automatic checks.
pub const MAX_CHECK_INTERVAL: Duration = Duration::from_secs(366 * 24 * 60 * 60);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("invalid feed URL '{url}': {details}")]
    InvalidFeedUrl { url: String, details: String },
    #[error("feed URL must use http or https, got '{scheme}'")]
    UnsupportedScheme { scheme: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdaterConfig {
    #[serde(default)]
    pub feed_url: String,

    #[serde(default = "default_app_name")]
    pub app_name: String,

    #[serde(default)]
    pub current_version: String,

    #[serde(default = "default_http_timeout")]
    pub http_timeout_secs: u64,

    #[serde(default = "default_check_interval")]
    pub check_interval_hours: u64,

    #[serde(default = "default_settings_namespace")]
    pub settings_namespace: String,

    #[serde(default)]
    pub debug_logging: bool,

    #[serde(default = "default_max_log_size_bytes")]
    pub max_log_size_bytes: u64,
}

fn default_app_name() -> String {
    "Application".to_string()
}

fn default_http_timeout() -> u64 {
    10
}

fn default_check_interval() -> u64 {
    24
}

fn default_settings_namespace() -> String {
    "updater".to_string()
}

fn default_max_log_size_bytes() -> u64 {
    5 * 1024 * 1024
}

impl Default for UpdaterConfig {
    fn default() -> Self {
        Self {
            feed_url: String::new(),
            app_name: default_app_name(),
            current_version: String::new(),
            http_timeout_secs: default_http_timeout(),
            check_interval_hours: default_check_interval(),
            settings_namespace: default_settings_namespace(),
            debug_logging: false,
            max_log_size_bytes: default_max_log_size_bytes(),
        }
    }
}

impl UpdaterConfig {
    #[must_use]
    pub fn new(
        app_name: impl Into<String>,
        current_version: impl Into<String>,
        feed_url: impl Into<String>,
    ) -> Self {
        Self {
            app_name: app_name.into(),
            current_version: current_version.into(),
            feed_url: feed_url.into(),
            ..Self::default()
        }
    }

    /// Read the config from `path`, falling back to defaults when the file
    /// is missing or cannot be parsed.
    #[must_use]
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|error| {
                log::warn!("Ignoring invalid updater config {}: {error}", path.display());
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    /// Write the config as pretty JSON.
    ///
    /// # Errors
    /// Returns an error when the parent directory or file cannot be written.
    pub fn save(&self, path: &Path) -> Result<(), std::io::Error> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)
    }

    /// The configured feed address.
    ///
    /// # Errors
    /// Returns an error when the URL does not parse or is not http(s).
    pub fn feed_url(&self) -> Result<Url, ConfigError> {
        let url =
            Url::parse(self.feed_url.trim()).map_err(|error| ConfigError::InvalidFeedUrl {
                url: self.feed_url.clone(),
                details: error.to_string(),
            })?;
        match url.scheme() {
            "http" | "https" => Ok(url),
            other => Err(ConfigError::UnsupportedScheme {
                scheme: other.to_string(),
            }),
        }
    }

    #[must_use]
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs.max(1))
    }

    /// Time between automatic checks, kept between one hour and
    /// [`MAX_CHECK_INTERVAL`].
    #[must_use]
    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_hours.saturating_mul(60 * 60))
            .clamp(Duration::from_secs(60 * 60), MAX_CHECK_INTERVAL)
    }

    #[must_use]
    pub fn user_agent(&self) -> String {
        let version = if self.current_version.is_empty() {
            "unknown"
        } else {
            self.current_version.as_str()
        };
        format!(
            "{}/{version} updraft/{}",
            self.app_name.replace(char::is_whitespace, "-"),
            env!("CARGO_PKG_VERSION")
        )
    }
}
