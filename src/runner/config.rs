//! Loader configuration file parsing.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::clock::duration_millis;
use super::error::LoaderError;
use super::transport::FetchMode;

pub const DEFAULT_BASE_PATH: &str = "src";

/// Recognized loader options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct LoaderConfig {
    /// Root for every resolved resource URL.
    pub base_path: String,
    /// Non-blocking fetches when true, blocking ones otherwise.
    pub use_asynchronous: bool,
    /// Accepted for compatibility; cache-busting tokens are always appended.
    pub use_cache: bool,
    /// Deadline for pending requests. `None` waits forever.
    pub request_timeout_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ConfigFile {
    loader: LoaderConfig,
}

impl LoaderConfig {
    pub fn new() -> Self {
        LoaderConfig {
            base_path: DEFAULT_BASE_PATH.to_string(),
            use_asynchronous: true,
            use_cache: false,
            request_timeout_ms: None,
        }
    }

    /// Load configuration from a TOML file.
    ///
    /// Expected format:
    /// ```toml
    /// [loader]
    /// basePath = "public/js"
    /// useAsynchronous = false
    /// useCache = false
    /// requestTimeoutMs = 5000
    /// ```
    pub fn load(path: &Path) -> Result<Self, LoaderError> {
        let content = fs::read_to_string(path)
            .map_err(|e| LoaderError::Config(format!("Failed to read config file: {}", e)))?;

        Self::parse(&content)
    }

    /// Parse configuration from a TOML string. Missing keys keep their defaults.
    pub fn parse(content: &str) -> Result<Self, LoaderError> {
        let file: ConfigFile =
            toml::from_str(content).map_err(|e| LoaderError::Config(e.to_string()))?;
        Ok(file.loader)
    }

    pub fn with_base_path(mut self, base_path: impl Into<String>) -> Self {
        self.base_path = base_path.into();
        self
    }

    pub fn with_asynchronous(mut self, use_asynchronous: bool) -> Self {
        self.use_asynchronous = use_asynchronous;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout_ms = Some(duration_millis(timeout));
        self
    }

    pub fn fetch_mode(&self) -> FetchMode {
        if self.use_asynchronous {
            FetchMode::NonBlocking
        } else {
            FetchMode::Blocking
        }
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_ms.map(Duration::from_millis)
    }
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self::new()
    }
}
