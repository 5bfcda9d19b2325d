//! Output side of the feed: the wrist render sink and the notification queue.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};

use crate::feed::entry::EnrichedEntry;
use crate::time_utils;

/// Receives the published wrist feed. Delivery is fire-and-forget: a sink
/// logs its own failures and never reports back.
pub trait RenderSink: Send + Sync {
    /// Serialized, capped, newest-first JSON array.
    fn render_wrist_feed(&self, payload: &str);

    /// Dialog refreshers run alongside every publish.
    fn apply_user_dialog_instances(&self) {}
    fn apply_world_dialog_instances(&self) {}
    fn apply_group_dialog_instances(&self) {}
}

/// Desktop/overlay notification side channel for moderation shadows.
/// Implementations dedupe; the same shadow is offered on every rescan.
pub trait NotificationQueue: Send + Sync {
    fn queue_game_log_noty(&self, entry: &EnrichedEntry);
}

/// Writes the payload to a JSON file the overlay polls.
pub struct FileSink {
    path: PathBuf,
}

impl FileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Temp file + rename; readers never see a half-written feed.
    fn write_atomic(&self, payload: &str) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, payload)?;
        std::fs::rename(&tmp, &self.path)
    }
}

impl RenderSink for FileSink {
    fn render_wrist_feed(&self, payload: &str) {
        match self.write_atomic(payload) {
            Ok(()) => tracing::debug!(path = %self.path.display(), bytes = payload.len(), "Wrist feed written"),
            Err(e) => tracing::warn!(path = %self.path.display(), error = %e, "Failed to write wrist feed"),
        }
    }
}

/// (kind, user id or display name, created_at)
type ShadowKey = (String, String, DateTime<Utc>);

/// Logs shadows instead of raising desktop notifications (CLI use).
/// Each shadow is logged once; keys fall out at the feed window edge.
#[derive(Debug, Default)]
pub struct LogNotificationQueue {
    seen: Mutex<HashSet<ShadowKey>>,
}

impl LogNotificationQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of shadows currently remembered.
    pub fn remembered(&self) -> usize {
        self.seen.lock().map(|s| s.len()).unwrap_or(0)
    }

    /// True the first time a shadow inside the window is offered.
    fn admit(&self, entry: &EnrichedEntry, now: DateTime<Utc>) -> bool {
        let cutoff = time_utils::window_start(now);
        let mut seen = self.seen.lock().unwrap_or_else(|e| e.into_inner());
        seen.retain(|(_, _, at)| *at >= cutoff);
        if entry.created_at() < cutoff {
            return false;
        }
        let actor = entry
            .entry
            .user_id
            .as_deref()
            .or(entry.entry.display_name.as_deref())
            .unwrap_or("")
            .to_string();
        seen.insert((entry.kind().to_string(), actor, entry.created_at()))
    }
}

impl NotificationQueue for LogNotificationQueue {
    fn queue_game_log_noty(&self, entry: &EnrichedEntry) {
        if !self.admit(entry, time_utils::now()) {
            return;
        }
        tracing::info!(
            kind = entry.kind(),
            display_name = entry.entry.display_name.as_deref().unwrap_or(""),
            created_at = %entry.created_at(),
            "Moderated player activity"
        );
    }
}
