use chrono::{DateTime, Utc};

use super::entry::{EnrichedEntry, Source};

/// Latest reduction of one source table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceBucket {
    /// Newest first.
    pub items: Vec<EnrichedEntry>,
    /// `created_at` of the newest row considered by the last rescan.
    pub last_seen: Option<DateTime<Utc>>,
}

impl SourceBucket {
    /// Recency short-circuit: a table whose newest row was already seen
    /// needs no rescan unless forced.
    pub fn needs_rescan(&self, newest: DateTime<Utc>, force: bool) -> bool {
        force || self.last_seen != Some(newest)
    }
}

/// Process-wide feed state: one bucket per source plus the render flag.
#[derive(Debug, Clone, Default)]
pub struct FeedState {
    game_log: SourceBucket,
    feed: SourceBucket,
    notifications: SourceBucket,
    friend_log: SourceBucket,
    moderation_against: SourceBucket,
    pub pending_render: bool,
}

impl FeedState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bucket(&self, source: Source) -> &SourceBucket {
        match source {
            Source::GameLog => &self.game_log,
            Source::Feed => &self.feed,
            Source::Notifications => &self.notifications,
            Source::FriendLog => &self.friend_log,
            Source::ModerationAgainst => &self.moderation_against,
        }
    }

    pub fn bucket_mut(&mut self, source: Source) -> &mut SourceBucket {
        match source {
            Source::GameLog => &mut self.game_log,
            Source::Feed => &mut self.feed,
            Source::Notifications => &mut self.notifications,
            Source::FriendLog => &mut self.friend_log,
            Source::ModerationAgainst => &mut self.moderation_against,
        }
    }

    /// Replace a bucket's items after a completed rescan up to `newest`.
    pub fn publish_bucket(
        &mut self,
        source: Source,
        items: Vec<EnrichedEntry>,
        newest: DateTime<Utc>,
    ) {
        let bucket = self.bucket_mut(source);
        bucket.items = items;
        bucket.last_seen = Some(newest);
        self.pending_render = true;
    }

    /// All buckets' items concatenated in source order.
    pub fn all_items(&self) -> Vec<EnrichedEntry> {
        Source::ALL
            .iter()
            .flat_map(|s| self.bucket(*s).items.iter().cloned())
            .collect()
    }

    /// Account switch: forget everything.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
