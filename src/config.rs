//! Service configuration loaded from `~/.config/sourcemux/config.toml`.
//!
//! Every field has a default, so a missing file is the same as an empty one.
//! `ADDON_HOST` and `SOURCEMUX_BIND` override the file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::metadata::CINEMETA_BASE;
use crate::source::BUILTIN_SOURCES;

/// Proxy link base when neither the file nor `ADDON_HOST` sets one.
pub const DEFAULT_PUBLIC_URL: &str = "http://127.0.0.1:7000";

pub const ENV_PUBLIC_URL: &str = "ADDON_HOST";
pub const ENV_BIND: &str = "SOURCEMUX_BIND";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Listen address for `serve`.
    pub bind: String,
    /// Externally reachable base URL, used to build proxy links.
    pub public_url: Option<String>,
    /// Cinemeta-compatible metadata endpoint.
    pub metadata_base: String,
    /// Budget for one source call (search, details, streams).
    pub source_timeout_secs: u64,
    /// Budget for one HTTP request made by a source.
    pub request_timeout_secs: u64,
    /// Enabled source tags, highest priority first.
    pub sources: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:7000".to_string(),
            public_url: None,
            metadata_base: CINEMETA_BASE.to_string(),
            source_timeout_secs: 15,
            request_timeout_secs: 30,
            sources: BUILTIN_SOURCES.iter().map(ToString::to_string).collect(),
        }
    }
}

impl Config {
    /// Load from `path`, or from the default location when `None`.
    ///
    /// An explicit path must exist; the default one is optional. Environment
    /// overrides are applied last.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid TOML.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                let path = config_path();
                if path.exists() {
                    Self::from_file(&path)?
                } else {
                    Self::default()
                }
            }
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("invalid TOML in {}", path.display()))
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup(ENV_PUBLIC_URL).filter(|v| !v.trim().is_empty()) {
            self.public_url = Some(url);
        }
        if let Some(bind) = lookup(ENV_BIND).filter(|v| !v.trim().is_empty()) {
            self.bind = bind;
        }
    }

    /// Base for proxy links, without a trailing slash.
    #[must_use]
    pub fn public_base(&self) -> String {
        self.public_url
            .as_deref()
            .unwrap_or(DEFAULT_PUBLIC_URL)
            .trim_end_matches('/')
            .to_string()
    }

    #[must_use]
    pub fn source_timeout(&self) -> Duration {
        Duration::from_secs(self.source_timeout_secs.max(1))
    }

    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }
}

/// Return the path to the default config file.
pub fn config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("sourcemux")
        .join("config.toml")
}
