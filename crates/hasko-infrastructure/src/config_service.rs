//! Application configuration.
//!
//! Loads `config.toml` from the Hasko config directory. A missing file or an
//! unreadable one falls back to defaults with a warning so the client always
//! starts.

use crate::paths::HaskoPaths;
use hasko_core::error::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default relay base URL.
pub const DEFAULT_BACKEND_URL: &str = "http://127.0.0.1:8000";

/// Default bound for establishing relay responses. Covers connecting and
/// receiving response headers only, never reading the reply stream.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Application configuration, persisted as `config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Base URL of the inference relay backend.
    #[serde(default = "default_backend_url")]
    pub backend_url: String,
    /// Timeout in seconds for establishing relay responses.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_backend_url() -> String {
    DEFAULT_BACKEND_URL.to_string()
}

fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            backend_url: default_backend_url(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl AppConfig {
    /// Loads the configuration from the given path.
    ///
    /// # Returns
    ///
    /// - `Ok(config)`: Parsed configuration
    /// - `Err(_)`: File unreadable or malformed TOML
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: AppConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Loads the configuration from the default location, falling back to
    /// defaults when the file is missing or unreadable.
    pub fn load_or_default() -> Self {
        let path = match HaskoPaths::config_file() {
            Ok(path) => path,
            Err(e) => {
                tracing::warn!("Cannot resolve config path, using defaults: {}", e);
                return Self::default();
            }
        };

        if !path.exists() {
            return Self::default();
        }

        match Self::load(&path) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("Failed to load config, using defaults: {}", e);
                Self::default()
            }
        }
    }
}
