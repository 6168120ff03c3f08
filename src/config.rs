//! Configuration file parser for ~/.config/feedrace/config.toml.
//!
//! The config file is optional; a missing file yields `Config::default()`.
//! Unknown keys are silently ignored by serde (with `deny_unknown_fields` off),
//! though we log a warning when the file contains potential typos.
use serde::Deserialize;
use std::num::NonZeroUsize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// SEC-014: Config file exceeds maximum allowed size.
    #[error("Config file too large: {0}")]
    TooLarge(String),

    /// A value parsed but cannot be used (e.g. no relays).
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Endpoints, timeouts and cache sizing for the fetch engine.
///
/// All fields use `#[serde(default)]` so any subset of keys can be specified.
/// Missing keys fall back to `Default::default()`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Feed-to-JSON conversion endpoint; the feed URL goes in `rss_url`.
    pub json_api_url: String,

    /// Relay URL prefixes. The percent-encoded feed URL is appended verbatim,
    /// so each prefix ends with its query parameter (`...?url=`).
    pub relays: Vec<String>,

    /// Bound on each relay request, including the body read.
    pub relay_timeout_ms: u64,

    /// Bound on the JSON conversion request.
    pub json_timeout_ms: u64,

    /// Freshness window for cached fetch results.
    pub cache_ttl_secs: u64,

    /// Maximum number of feeds kept in the result cache.
    pub cache_capacity: usize,

    /// Response bodies larger than this are rejected.
    pub max_response_bytes: usize,

    /// Feeds fetched concurrently per batch during a full refresh.
    pub refresh_chunk_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            json_api_url: "https://api.rss2json.com/v1/api.json".to_string(),
            relays: vec![
                "https://corsproxy.io/?".to_string(),
                "https://api.allorigins.win/raw?url=".to_string(),
                "https://api.codetabs.com/v1/proxy?quest=".to_string(),
            ],
            relay_timeout_ms: 6_000,
            json_timeout_ms: 30_000,
            cache_ttl_secs: 300,
            cache_capacity: 512,
            max_response_bytes: 10 * 1024 * 1024, // 10MB
            refresh_chunk_size: 3,
        }
    }
}

impl Config {
    /// SEC-014: Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Unknown keys → silently accepted (serde default behavior), logged as warning
    /// - Unusable values → `Err(ConfigError::Invalid)`
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        // SEC-014: Check file size before reading to prevent memory exhaustion
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // Race condition: file deleted between metadata and read
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        if content.trim().is_empty() {
            tracing::debug!(path = %path.display(), "Config file is empty, using defaults");
            return Ok(Self::default());
        }

        let config = Self::from_toml(&content)?;
        tracing::info!(
            path = %path.display(),
            relays = config.relays.len(),
            "Loaded configuration"
        );
        Ok(config)
    }

    /// Parses and validates TOML content.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        if let Ok(raw) = content.parse::<toml::Table>() {
            let known_keys = [
                "json_api_url",
                "relays",
                "relay_timeout_ms",
                "json_timeout_ms",
                "cache_ttl_secs",
                "cache_capacity",
                "max_response_bytes",
                "refresh_chunk_size",
            ];
            for key in raw.keys() {
                if !known_keys.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects values the fetch engine cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        url::Url::parse(&self.json_api_url).map_err(|e| {
            ConfigError::Invalid(format!("json_api_url '{}': {e}", self.json_api_url))
        })?;

        if self.relays.is_empty() {
            return Err(ConfigError::Invalid(
                "at least one relay is required".to_string(),
            ));
        }
        if let Some(bad) = self
            .relays
            .iter()
            .find(|r| !r.starts_with("http://") && !r.starts_with("https://"))
        {
            return Err(ConfigError::Invalid(format!(
                "relay '{bad}' must be an http(s) URL prefix"
            )));
        }

        if self.relay_timeout_ms == 0 || self.json_timeout_ms == 0 {
            return Err(ConfigError::Invalid("timeouts must be non-zero".to_string()));
        }
        if self.cache_capacity == 0 {
            return Err(ConfigError::Invalid("cache_capacity must be non-zero".to_string()));
        }
        if self.refresh_chunk_size == 0 {
            return Err(ConfigError::Invalid(
                "refresh_chunk_size must be non-zero".to_string(),
            ));
        }

        Ok(())
    }

    pub fn relay_timeout(&self) -> Duration {
        Duration::from_millis(self.relay_timeout_ms)
    }

    pub fn json_timeout(&self) -> Duration {
        Duration::from_millis(self.json_timeout_ms)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    /// Capacity as the cache expects it. `validate` rejects zero, so the
    /// fallback only matters for configs built without validation.
    pub fn cache_capacity(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.cache_capacity).unwrap_or(NonZeroUsize::MIN)
    }
}

// ============================================================================
// Tests
// ============================================================================
