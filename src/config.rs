//! Feed settings, stored as JSON in `{data_dir}/config.json`.
//!
//! ```json
//! {
//!   "shared_feed_filters": { "wrist": { "GPS": "Friends", "OnPlayerJoined": "Everyone" } },
//!   "hide_private_from_feed": false,
//!   "debounce_ms": 150,
//!   "wrist_feed_path": null,
//!   "retention_days": 7
//! }
//! ```

use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::feed::filters::WristFilters;
use crate::storage::path_utils;
use crate::FeedResult;

/// Settings key the filter policy table lives under.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SharedFeedFilters {
    #[serde(default)]
    pub wrist: WristFilters,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedConfig {
    #[serde(default)]
    pub shared_feed_filters: SharedFeedFilters,
    /// Drop GPS rows pointing at private instances.
    #[serde(default)]
    pub hide_private_from_feed: bool,
    /// Cooldown window of the update scheduler.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    /// Where the file sink writes the payload. Defaults to `{data_dir}/wrist_feed.json`.
    #[serde(default)]
    pub wrist_feed_path: Option<String>,
    /// Event rows older than this are pruned by `watch`. 0 keeps everything.
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,
}

fn default_debounce_ms() -> u64 {
    crate::constants::DEBOUNCE_MS
}

fn default_retention_days() -> u32 {
    crate::constants::EVENT_RETENTION_DAYS
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            shared_feed_filters: SharedFeedFilters::default(),
            hide_private_from_feed: false,
            debounce_ms: default_debounce_ms(),
            wrist_feed_path: None,
            retention_days: default_retention_days(),
        }
    }
}

impl FeedConfig {
    pub fn wrist_filters(&self) -> &WristFilters {
        &self.shared_feed_filters.wrist
    }

    pub fn wrist_feed_path(&self) -> PathBuf {
        self.wrist_feed_path
            .as_deref()
            .map(|p| PathBuf::from(path_utils::expand_tilde(p)))
            .unwrap_or_else(path_utils::wrist_feed_path)
    }

    /// Prune cutoff for the event tables. Never inside the feed window.
    pub fn retention_cutoff(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        if self.retention_days == 0 {
            return None;
        }
        let retention = Duration::days(i64::from(self.retention_days));
        let window = Duration::hours(crate::constants::FEED_WINDOW_HOURS);
        Some(now - retention.max(window))
    }

    /// Load from `{data_dir}/config.json`.
    pub fn load() -> Self {
        Self::load_from(&path_utils::config_path())
    }

    /// Returns defaults if the file is missing or invalid.
    pub fn load_from(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "Invalid feed config, using defaults"
                );
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    pub fn save(&self) -> FeedResult<()> {
        self.save_to(&path_utils::config_path())
    }

    pub fn save_to(&self, path: &Path) -> FeedResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        tracing::debug!(path = %path.display(), "Feed config saved");
        Ok(())
    }
}
