//! The four plain reducers: feed, notifications, friend log, moderation-against.

use super::{Enrichment, ReduceContext};
use crate::feed::entry::{kinds, EnrichedEntry, RawEntry, Source};

/// Shared scan loop. `admit` decides per row (type skips + filter policy);
/// the scan stops at the window edge or once `cap` rows are kept.
fn scan<F>(rows: &[RawEntry], ctx: &ReduceContext<'_>, cap: usize, admit: F) -> Vec<EnrichedEntry>
where
    F: Fn(&RawEntry, &Enrichment) -> bool,
{
    let cutoff = ctx.window_start();
    let mut out = Vec::with_capacity(cap);
    for row in rows {
        if row.created_at < cutoff {
            break;
        }
        let enrichment = Enrichment::resolve(row, ctx.social);
        if !admit(row, &enrichment) {
            continue;
        }
        out.push(enrichment.apply(row.clone()));
        if out.len() >= cap {
            break;
        }
    }
    out
}

/// GPS / Online / Offline / Status. Avatar rows never reach the wrist.
pub fn reduce_feed(rows: &[RawEntry], ctx: &ReduceContext<'_>) -> Vec<EnrichedEntry> {
    scan(rows, ctx, Source::Feed.cap(), |row, e| {
        if row.kind == kinds::AVATAR {
            return false;
        }
        if ctx.hide_private
            && row.kind == kinds::GPS
            && row.location.as_deref() == Some(kinds::PRIVATE_LOCATION)
        {
            return false;
        }
        ctx.filters.admits(&row.kind, e.is_friend, e.is_favorite)
    })
}

/// Notifications we sent ourselves are dropped.
pub fn reduce_notifications(rows: &[RawEntry], ctx: &ReduceContext<'_>) -> Vec<EnrichedEntry> {
    scan(rows, ctx, Source::Notifications.cap(), |row, e| {
        if ctx.is_self(row) {
            return false;
        }
        ctx.filters.admits(&row.kind, e.is_friend, e.is_favorite)
    })
}

/// Friend requests go through the notification flow instead.
pub fn reduce_friend_log(rows: &[RawEntry], ctx: &ReduceContext<'_>) -> Vec<EnrichedEntry> {
    scan(rows, ctx, Source::FriendLog.cap(), |row, e| {
        if row.kind == kinds::FRIEND_REQUEST {
            return false;
        }
        ctx.filters.admits(&row.kind, e.is_friend, e.is_favorite)
    })
}

/// Moderations against us: `On` or nothing, no friend tiers.
pub fn reduce_moderation_against(
    rows: &[RawEntry],
    ctx: &ReduceContext<'_>,
) -> Vec<EnrichedEntry> {
    scan(rows, ctx, Source::ModerationAgainst.cap(), |row, _| {
        ctx.filters.admits_on_only(&row.kind)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::filters::{FilterPolicy, WristFilters};
    use crate::test_helpers::*;
    use chrono::Duration;

    fn gps(user: &str, mins: i64) -> RawEntry {
        RawEntryBuilder::new("GPS").user(user, user).at(minutes_ago(mins)).build()
    }

    #[test]
    fn test_feed_filter_policies() {
        let social = StubSocial::new().friend("usr_f").friend("usr_v").favorite("usr_v");
        let rows = vec![gps("usr_v", 1), gps("usr_f", 2), gps("usr_x", 3)];

        let friends = WristFilters::empty().with("GPS", FilterPolicy::Friends);
        let out = reduce_feed(&rows, &context(&friends, &social, false));
        assert_eq!(out.len(), 2);
        assert!(out.iter().all(|e| e.is_friend));

        let vip = WristFilters::empty().with("GPS", FilterPolicy::Vip);
        let out = reduce_feed(&rows, &context(&vip, &social, false));
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].entry.user_id.as_deref(), Some("usr_v"));

        let everyone = WristFilters::empty().with("GPS", FilterPolicy::Everyone);
        assert_eq!(reduce_feed(&rows, &context(&everyone, &social, false)).len(), 3);

        let on = WristFilters::empty().with("GPS", FilterPolicy::On);
        assert_eq!(reduce_feed(&rows, &context(&on, &social, false)).len(), 3);

        let off = WristFilters::empty().with("GPS", FilterPolicy::Off);
        assert!(reduce_feed(&rows, &context(&off, &social, false)).is_empty());
    }

    #[test]
    fn test_feed_skips_avatar_even_when_on() {
        let social = StubSocial::new();
        let filters = WristFilters::empty().with("Avatar", FilterPolicy::On);
        let rows = vec![RawEntryBuilder::new("Avatar").at(minutes_ago(1)).build()];
        assert!(reduce_feed(&rows, &context(&filters, &social, false)).is_empty());
    }

    #[test]
    fn test_feed_hide_private_gps() {
        let social = StubSocial::new();
        let filters = WristFilters::empty().with("GPS", FilterPolicy::Everyone);
        let rows = vec![
            RawEntryBuilder::new("GPS").location("private").at(minutes_ago(1)).build(),
            RawEntryBuilder::new("GPS").location("wrld_1:123").at(minutes_ago(2)).build(),
        ];

        let mut ctx = context(&filters, &social, false);
        assert_eq!(reduce_feed(&rows, &ctx).len(), 2);
        ctx.hide_private = true;
        let out = reduce_feed(&rows, &ctx);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].entry.location.as_deref(), Some("wrld_1:123"));
    }

    #[test]
    fn test_window_boundary() {
        let social = StubSocial::new();
        let filters = WristFilters::empty().with("Online", FilterPolicy::Everyone);
        let ctx = context(&filters, &social, false);
        let inside = ctx.now - Duration::hours(24) + Duration::seconds(1);
        let outside = ctx.now - Duration::hours(24) - Duration::milliseconds(1);
        let rows = vec![
            RawEntryBuilder::new("Online").at(inside).build(),
            RawEntryBuilder::new("Online").at(outside).build(),
        ];
        let out = reduce_feed(&rows, &ctx);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].created_at(), inside);
    }

    #[test]
    fn test_window_stops_scan_not_filter() {
        // A row out of window ends the scan even if older-looking rows follow
        let social = StubSocial::new();
        let filters = WristFilters::empty().with("Online", FilterPolicy::Everyone);
        let ctx = context(&filters, &social, false);
        let rows = vec![
            RawEntryBuilder::new("Online").at(minutes_ago(1)).build(),
            RawEntryBuilder::new("Online").at(ctx.now - Duration::hours(30)).build(),
            RawEntryBuilder::new("Online").at(minutes_ago(5)).build(),
        ];
        assert_eq!(reduce_feed(&rows, &ctx).len(), 1);
    }

    #[test]
    fn test_feed_cap() {
        let social = StubSocial::new();
        let filters = WristFilters::empty().with("Online", FilterPolicy::Everyone);
        let rows: Vec<RawEntry> = (0..40)
            .map(|i| RawEntryBuilder::new("Online").at(minutes_ago(i)).build())
            .collect();
        let out = reduce_feed(&rows, &context(&filters, &social, false));
        assert_eq!(out.len(), crate::constants::FEED_CAP);
        assert_eq!(out[0].created_at(), rows[0].created_at);
    }

    #[test]
    fn test_notifications_skip_self_sender() {
        let social = StubSocial::new().me("usr_me", "Me");
        let filters = WristFilters::empty().with("invite", FilterPolicy::Everyone);
        let rows = vec![
            RawEntryBuilder::new("invite").user("usr_me", "Me").at(minutes_ago(1)).build(),
            RawEntryBuilder::new("invite").user("usr_a", "Alice").at(minutes_ago(2)).build(),
        ];
        let out = reduce_notifications(&rows, &context(&filters, &social, false));
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].entry.user_id.as_deref(), Some("usr_a"));
    }

    #[test]
    fn test_friend_log_skips_friend_requests() {
        let social = StubSocial::new();
        let filters = WristFilters::empty()
            .with("FriendRequest", FilterPolicy::On)
            .with("Friend", FilterPolicy::On);
        let rows = vec![
            RawEntryBuilder::new("FriendRequest").at(minutes_ago(1)).build(),
            RawEntryBuilder::new("Friend").at(minutes_ago(2)).build(),
        ];
        let out = reduce_friend_log(&rows, &context(&filters, &social, false));
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].kind(), "Friend");
    }

    #[test]
    fn test_moderation_against_on_only_with_tag() {
        let social = StubSocial::new().tag("usr_a", "#abcdef");
        let filters = WristFilters::empty()
            .with("Blocked", FilterPolicy::On)
            .with("Muted", FilterPolicy::Everyone);
        let rows = vec![
            RawEntryBuilder::new("Blocked").user("usr_a", "Alice").at(minutes_ago(1)).build(),
            RawEntryBuilder::new("Muted").user("usr_a", "Alice").at(minutes_ago(2)).build(),
        ];
        let out = reduce_moderation_against(&rows, &context(&filters, &social, false));
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].kind(), "Blocked");
        assert_eq!(out[0].tag_colour.as_deref(), Some("#abcdef"));
    }
}
