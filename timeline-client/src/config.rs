//! Configuration for the timeline controller.
//!
//! Loaded from a TOML file or built in code with the `with_*` methods.
//! Every field has a default, so an empty file is a valid configuration.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use timeline_types::FeedKind;

/// Tuning knobs of [`TimelineSyncController`](crate::TimelineSyncController).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TimelineConfig {
    /// Full page size; a shorter older page means the tail was reached (default: 20).
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    /// Requests one `fetch_new_pages` call may issue (default: 5).
    #[serde(default = "default_max_pages")]
    pub max_pages: usize,
    /// Upper bound of catch-up iterations per run (default: 5).
    #[serde(default = "default_catch_up_rounds")]
    pub catch_up_rounds: usize,
    /// Posts kept below the lowest visible post after a merge (default: 15).
    #[serde(default = "default_safe_offset")]
    pub safe_offset: usize,
    /// Age under which a re-activated feed is shown without fetching (default: 60).
    #[serde(default = "default_refresh_ttl_secs")]
    pub refresh_ttl_secs: u64,
    /// Background poll interval in seconds, 0 disables (default: 30).
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    /// The single kind that accepts live stream events (default: local).
    #[serde(default = "default_live_kind")]
    pub live_kind: FeedKind,
    /// Maximum posts written to the cache per feed (default: 800).
    #[serde(default = "default_cache_limit")]
    pub cache_limit: usize,
}

// Default value functions
fn default_page_size() -> usize {
    20
}

fn default_max_pages() -> usize {
    5
}

fn default_catch_up_rounds() -> usize {
    5
}

fn default_safe_offset() -> usize {
    15
}

fn default_refresh_ttl_secs() -> u64 {
    60
}

fn default_poll_interval_secs() -> u64 {
    30
}

fn default_live_kind() -> FeedKind {
    FeedKind::Local
}

fn default_cache_limit() -> usize {
    800
}

impl Default for TimelineConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            max_pages: default_max_pages(),
            catch_up_rounds: default_catch_up_rounds(),
            safe_offset: default_safe_offset(),
            refresh_ttl_secs: default_refresh_ttl_secs(),
            poll_interval_secs: default_poll_interval_secs(),
            live_kind: default_live_kind(),
            cache_limit: default_cache_limit(),
        }
    }
}

impl TimelineConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the controller cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.page_size == 0 {
            return Err(ConfigError::Invalid {
                field: "page_size",
                reason: "must be at least 1".into(),
            });
        }
        if self.max_pages == 0 {
            return Err(ConfigError::Invalid {
                field: "max_pages",
                reason: "must be at least 1".into(),
            });
        }
        if self.live_kind.is_alias() {
            return Err(ConfigError::Invalid {
                field: "live_kind",
                reason: format!("{} is not a concrete feed", self.live_kind),
            });
        }
        Ok(())
    }

    /// Set the page size.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    /// Set the pages requested per catch-up fetch.
    pub fn with_max_pages(mut self, max_pages: usize) -> Self {
        self.max_pages = max_pages;
        self
    }

    /// Set the catch-up iteration bound.
    pub fn with_catch_up_rounds(mut self, rounds: usize) -> Self {
        self.catch_up_rounds = rounds;
        self
    }

    /// Set the tail trim bound.
    pub fn with_safe_offset(mut self, safe_offset: usize) -> Self {
        self.safe_offset = safe_offset;
        self
    }

    /// Set the fresh-restore window in seconds.
    pub fn with_refresh_ttl_secs(mut self, secs: u64) -> Self {
        self.refresh_ttl_secs = secs;
        self
    }

    /// Set the poll interval in seconds (0 disables polling).
    pub fn with_poll_interval_secs(mut self, secs: u64) -> Self {
        self.poll_interval_secs = secs;
        self
    }

    /// Set the live-eligible kind.
    pub fn with_live_kind(mut self, kind: FeedKind) -> Self {
        self.live_kind = kind;
        self
    }

    /// Set the per-feed cache cap.
    pub fn with_cache_limit(mut self, limit: usize) -> Self {
        self.cache_limit = limit;
        self
    }

    /// Fresh-restore window.
    pub fn refresh_ttl(&self) -> Duration {
        Duration::from_secs(self.refresh_ttl_secs)
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// Failed to parse configuration file.
    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying TOML parse error.
        source: toml::de::Error,
    },
    /// A value is out of range.
    #[error("invalid {field}: {reason}")]
    Invalid {
        /// Offending field.
        field: &'static str,
        /// What is wrong with it.
        reason: String,
    },
}
