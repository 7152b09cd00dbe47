//! Configuration file parser for ~/.config/feedrack/config.toml.
//!
//! The config file is optional; a missing file yields `Config::default()`.
//! Unknown keys are silently ignored by serde, though we log a warning when
//! the file contains potential typos. The running engine receives config
//! updates through a `tokio::sync::watch` channel; a change re-arms the
//! refresh timer for the *next* cycle and never cancels an in-flight batch.

use crate::view::FeedsOrder;
use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Plugin configuration.
///
/// All fields use `#[serde(default)]` so any subset of keys can be
/// specified. Missing keys fall back to `Default::default()`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Ordered list of feed URLs to aggregate. May be empty.
    pub sources: Vec<String>,

    /// Refresh interval in minutes. 0 = manual refresh only.
    pub refresh_interval_minutes: u64,

    /// Items retained per feed after a refresh. 0 = keep none.
    pub items_limit: usize,

    /// Feed list ordering: name, date, or unread.
    pub feeds_order: FeedsOrder,

    /// Whether item activation offers an HTML detail preview.
    pub enable_preview: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sources: Vec::new(),
            refresh_interval_minutes: 30,
            items_limit: 10,
            feeds_order: FeedsOrder::Name,
            enable_preview: true,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Unknown keys → silently accepted, logged as warning
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        if content.trim().is_empty() {
            tracing::debug!(path = %path.display(), "Config file is empty, using defaults");
            return Ok(Self::default());
        }

        // Parse the TOML content first as a raw table to detect unknown keys
        if let Ok(raw) = content.parse::<toml::Table>() {
            let known_keys = [
                "sources",
                "refresh_interval_minutes",
                "items_limit",
                "feeds_order",
                "enable_preview",
            ];
            for key in raw.keys() {
                if !known_keys.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        let mut config: Config = toml::from_str(&content)?;
        config.sources.retain(|source| {
            if is_valid_source(source) {
                true
            } else {
                tracing::warn!(source = %source, "Dropping source with invalid URL");
                false
            }
        });
        tracing::info!(
            path = %path.display(),
            sources = config.sources.len(),
            interval_minutes = config.refresh_interval_minutes,
            "Loaded configuration"
        );
        Ok(config)
    }
}

/// A usable feed source is an absolute http(s) URL.
fn is_valid_source(source: &str) -> bool {
    match url::Url::parse(source) {
        Ok(url) => matches!(url.scheme(), "http" | "https"),
        Err(_) => false,
    }
}
