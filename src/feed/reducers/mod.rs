//! Per-source reducers: one append-only table in, a bounded, filtered,
//! enriched, newest-first bucket out.
//!
//! All five share the same contract:
//!   1. empty table -> nothing
//!   2. newest row already seen and not forced -> nothing
//!   3. otherwise rescan newest -> oldest, stopping at the first row older
//!      than the 24h window, filtering and enriching each row, up to the
//!      source cap.
//!
//! The game log reducer adds moderation shadows and travel noise
//! cancellation on top (see `game_log`).

pub mod game_log;
pub mod sources;

use chrono::{DateTime, Utc};

use super::entry::{EnrichedEntry, RawEntry, Source};
use super::filters::WristFilters;
use super::source::{ModerationLookup, SourceTable};
use super::state::FeedState;
use crate::sink::NotificationQueue;
use crate::social::{CurrentUser, SocialGraph};
use crate::time_utils;
use crate::FeedResult;

/// Everything a reducer reads besides its own table.
pub struct ReduceContext<'a> {
    pub now: DateTime<Utc>,
    pub force: bool,
    pub filters: &'a WristFilters,
    pub hide_private: bool,
    pub social: &'a dyn SocialGraph,
    pub current_user: Option<CurrentUser>,
    pub noty: Option<&'a dyn NotificationQueue>,
}

impl ReduceContext<'_> {
    pub fn window_start(&self) -> DateTime<Utc> {
        time_utils::window_start(self.now)
    }

    pub fn is_self(&self, entry: &RawEntry) -> bool {
        self.current_user
            .as_ref()
            .is_some_and(|me| me.is_actor(entry.user_id.as_deref(), entry.display_name.as_deref()))
    }
}

/// Relationship state resolved for one row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Enrichment {
    pub is_friend: bool,
    pub is_favorite: bool,
    pub tag_colour: Option<String>,
}

impl Enrichment {
    /// Look the row's actor up by id, falling back to the display name.
    pub fn resolve(entry: &RawEntry, social: &dyn SocialGraph) -> Self {
        if let Some(user_id) = entry.user_id.as_deref() {
            return Self {
                is_friend: social.is_friend(user_id),
                is_favorite: social.is_favorite(user_id),
                tag_colour: social.tag_colour(user_id),
            };
        }
        if let Some(name) = entry.display_name.as_deref() {
            if let Some(user_id) = social.user_id_by_display_name(name) {
                return Self {
                    is_friend: social.is_friend(&user_id),
                    is_favorite: social.is_favorite(&user_id),
                    tag_colour: None,
                };
            }
        }
        Self::default()
    }

    pub fn apply(&self, entry: RawEntry) -> EnrichedEntry {
        EnrichedEntry {
            entry,
            is_friend: self.is_friend,
            is_favorite: self.is_favorite,
            tag_colour: self.tag_colour.clone(),
            is_traveling: false,
        }
    }
}

/// Rescan one source into its bucket if anything changed.
/// Returns true when the bucket was rebuilt.
pub fn reduce_source(
    state: &mut FeedState,
    source: Source,
    table: &dyn SourceTable,
    moderations: &dyn ModerationLookup,
    ctx: &ReduceContext<'_>,
) -> FeedResult<bool> {
    let Some(newest) = table.latest()? else {
        return Ok(false);
    };
    if !state.bucket(source).needs_rescan(newest, ctx.force) {
        tracing::trace!(source = %source, "Source unchanged, skipping rescan");
        return Ok(false);
    }

    let rows = table.recent_since(ctx.window_start())?;
    let items = match source {
        Source::GameLog => {
            let mods = moderations.player_moderations()?;
            game_log::reduce(&rows, &mods, ctx)
        }
        Source::Feed => sources::reduce_feed(&rows, ctx),
        Source::Notifications => sources::reduce_notifications(&rows, ctx),
        Source::FriendLog => sources::reduce_friend_log(&rows, ctx),
        Source::ModerationAgainst => sources::reduce_moderation_against(&rows, ctx),
    };

    tracing::debug!(
        source = %source,
        scanned = rows.len(),
        kept = items.len(),
        force = ctx.force,
        "Source reduced"
    );
    state.publish_bucket(source, items, newest);
    Ok(true)
}
