//! Game log reducer.
//!
//! Differs from the plain reducers in four ways:
//! - `Notification` rows are skipped (they belong to the notification table).
//! - Joins/leaves of players we blocked or muted spawn a shadow entry
//!   (`BlockedOnPlayerJoined`, `MutedOnPlayerLeft`, ...). Shadows bypass the
//!   cap and are also pushed to the notification queue.
//! - Instance travel floods the log with joins/leaves. A `LocationDestination`
//!   cancels leave-family entries within 5s of it, a `Location` cancels
//!   join-family entries within the 20s after it.
//! - The cap gates insertion but does not end the scan, since a later
//!   `Location` can still free slots.

use chrono::{DateTime, Duration, Utc};

use super::{Enrichment, ReduceContext};
use crate::constants::{JOIN_CANCEL_SECS, LEAVE_CANCEL_SECS};
use crate::feed::entry::{kinds, EnrichedEntry, PlayerModeration, RawEntry, Source};

struct Slot {
    entry: EnrichedEntry,
    shadow: bool,
}

/// Drop accumulated slots matching `family` within `[from, from + span]`.
/// Returns how many primary (non-shadow) slots went away.
fn cancel_window(
    slots: &mut Vec<Slot>,
    family: fn(&str) -> bool,
    from: DateTime<Utc>,
    span: Duration,
) -> usize {
    let until = from + span;
    let mut primaries = 0;
    slots.retain(|slot| {
        let t = slot.entry.created_at();
        let cancel = family(slot.entry.kind()) && t >= from && t <= until;
        if cancel && !slot.shadow {
            primaries += 1;
        }
        !cancel
    });
    primaries
}

/// Shadow kind for a moderation, if it is one we surface.
fn shadow_kind(moderation: &PlayerModeration, base: &str) -> Option<String> {
    match moderation.kind.as_str() {
        kinds::BLOCK => Some(format!("{}{}", kinds::BLOCKED_PREFIX, base)),
        kinds::MUTE => Some(format!("{}{}", kinds::MUTED_PREFIX, base)),
        _ => None,
    }
}

pub fn reduce(
    rows: &[RawEntry],
    moderations: &[PlayerModeration],
    ctx: &ReduceContext<'_>,
) -> Vec<EnrichedEntry> {
    let cutoff = ctx.window_start();
    let cap = Source::GameLog.cap();
    let leave_span = Duration::seconds(LEAVE_CANCEL_SECS);
    let join_span = Duration::seconds(JOIN_CANCEL_SECS);

    let mut slots: Vec<Slot> = Vec::new();
    let mut primaries = 0usize;
    // Most recent LocationDestination seen so far (scan goes backwards)
    let mut left_at: Option<DateTime<Utc>> = None;

    for row in rows {
        if row.created_at < cutoff {
            break;
        }
        if row.kind == kinds::NOTIFICATION {
            continue;
        }

        if row.kind == kinds::LOCATION_DESTINATION {
            primaries -= cancel_window(&mut slots, kinds::is_leave_family, row.created_at, leave_span);
            left_at = Some(row.created_at);
        } else if row.kind == kinds::LOCATION {
            primaries -= cancel_window(&mut slots, kinds::is_join_family, row.created_at, join_span);
        }

        // Leaves logged just before we travelled are the same noise
        let travel_noise = |kind: &str, at: DateTime<Utc>| {
            kinds::is_leave_family(kind)
                && left_at.is_some_and(|t| {
                    (t - at).num_milliseconds().abs() <= leave_span.num_milliseconds()
                })
        };

        let enrichment = Enrichment::resolve(row, ctx.social);

        if row.kind == kinds::ON_PLAYER_JOINED || row.kind == kinds::ON_PLAYER_LEFT {
            for moderation in moderations.iter().filter(|m| m.targets(row)) {
                let Some(kind) = shadow_kind(moderation, &row.kind) else {
                    continue;
                };
                let mut shadow = RawEntry::new(&kind, row.created_at);
                shadow.display_name = Some(moderation.target_display_name.clone());
                shadow.user_id = moderation
                    .target_user_id
                    .clone()
                    .or_else(|| row.user_id.clone());
                let shadow = enrichment.apply(shadow);

                if let Some(noty) = ctx.noty {
                    noty.queue_game_log_noty(&shadow);
                }
                if travel_noise(&kind, row.created_at) {
                    continue;
                }
                if ctx.filters.admits(&kind, enrichment.is_friend, enrichment.is_favorite) {
                    slots.push(Slot { entry: shadow, shadow: true });
                }
            }
        }

        if ctx.is_self(row) || travel_noise(&row.kind, row.created_at) {
            continue;
        }
        if primaries < cap
            && ctx.filters.admits(&row.kind, enrichment.is_friend, enrichment.is_favorite)
        {
            slots.push(Slot { entry: enrichment.apply(row.clone()), shadow: false });
            primaries += 1;
        }
    }

    slots.into_iter().map(|s| s.entry).collect()
}
