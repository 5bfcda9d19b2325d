//! Cross-source merge: buckets + live travelers -> one sorted, capped list.

use super::entry::{kinds, EnrichedEntry, RawEntry};
use super::filters::WristFilters;
use super::scheduler::RefreshHandle;
use crate::constants::WRIST_FEED_CAP;
use crate::social::{SocialGraph, Traveler, WorldDirectory};
use crate::FeedResult;

/// Synthesize entries for friends currently travelling.
///
/// Gated by the `OnPlayerJoining` filter and skipped for friends already in
/// our instance. A friend heading to our instance becomes `OnPlayerJoining`;
/// anyone else becomes a travelling `GPS` entry once the destination world
/// (and group, if any) names are cached. Cache misses leave the traveler out
/// of this pass; the directory re-triggers an update when warm.
pub fn traveler_entries(
    social: &dyn SocialGraph,
    directory: &dyn WorldDirectory,
    filters: &WristFilters,
    refresh: &RefreshHandle,
) -> Vec<EnrichedEntry> {
    let Some(policy) = filters.get(kinds::ON_PLAYER_JOINING) else {
        return Vec::new();
    };
    let here = social.last_location();
    let mut out = Vec::new();

    for traveler in social.current_travelers() {
        let is_favorite = social.is_favorite(&traveler.user_id);
        if !policy.admits(true, is_favorite) || here.player_ids.contains(&traveler.user_id) {
            continue;
        }
        let entry = if traveler.location == here.location {
            Some(joining_entry(&traveler))
        } else {
            resolve_gps_entry(&traveler, directory, refresh)
        };
        if let Some(entry) = entry {
            out.push(EnrichedEntry {
                entry,
                is_friend: true,
                is_favorite,
                tag_colour: social.tag_colour(&traveler.user_id),
                is_traveling: traveler.location != here.location,
            });
        }
    }
    out
}

fn joining_entry(traveler: &Traveler) -> RawEntry {
    let mut entry = RawEntry::new(kinds::ON_PLAYER_JOINING, traveler.created_at);
    entry.user_id = Some(traveler.user_id.clone());
    entry.display_name = Some(traveler.display_name.clone());
    entry.location = Some(traveler.location.clone());
    entry
}

fn resolve_gps_entry(
    traveler: &Traveler,
    directory: &dyn WorldDirectory,
    refresh: &RefreshHandle,
) -> Option<RawEntry> {
    let group_name = match traveler.group_id.as_deref() {
        Some(group_id) => match directory.group_name(group_id, refresh) {
            Some(name) => Some(name),
            None => {
                tracing::debug!(user = %traveler.user_id, group_id, "Traveler group not cached yet");
                return None;
            }
        },
        None => None,
    };
    let Some(world_name) = directory.world_name(&traveler.world_id, refresh) else {
        tracing::debug!(user = %traveler.user_id, world_id = %traveler.world_id, "Traveler world not cached yet");
        return None;
    };

    let mut entry = RawEntry::new(kinds::GPS, traveler.created_at);
    entry.user_id = Some(traveler.user_id.clone());
    entry.display_name = Some(traveler.display_name.clone());
    entry.location = Some(traveler.location.clone());
    entry.world_name = Some(world_name);
    entry.group_name = group_name;
    Some(entry)
}

/// Global newest-first sort (stable) and the hard wrist cap.
pub fn sort_and_cap(mut items: Vec<EnrichedEntry>) -> Vec<EnrichedEntry> {
    items.sort_by(|a, b| b.created_at().cmp(&a.created_at()));
    items.truncate(WRIST_FEED_CAP);
    items
}

pub fn serialize(items: &[EnrichedEntry]) -> FeedResult<String> {
    Ok(serde_json::to_string(items)?)
}
