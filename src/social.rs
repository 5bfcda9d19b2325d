//! Relationship state read by the feed: friends, favorites, custom tags,
//! live travelers, and the world/group name cache.
//!
//! The feed never writes any of this. The companion app owns it and exports
//! a `social.json` snapshot which `SocialSnapshot` loads for the CLI.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::feed::scheduler::RefreshHandle;
use crate::FeedResult;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentUser {
    pub id: String,
    pub display_name: String,
}

impl CurrentUser {
    /// Whether the actor of a row is us (by id, else by display name).
    pub fn is_actor(&self, user_id: Option<&str>, display_name: Option<&str>) -> bool {
        user_id.is_some_and(|id| id == self.id)
            || display_name.is_some_and(|n| n == self.display_name)
    }
}

/// A friend currently moving between instances.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Traveler {
    pub user_id: String,
    pub display_name: String,
    /// Full instance tag of the destination.
    pub location: String,
    pub world_id: String,
    #[serde(default)]
    pub group_id: Option<String>,
    /// When the travel started.
    #[serde(rename = "created_at")]
    pub created_at: DateTime<Utc>,
}

/// Where we are right now and who is already there with us.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LastLocation {
    pub location: String,
    #[serde(default)]
    pub player_ids: HashSet<String>,
}

pub trait SocialGraph: Send + Sync {
    fn is_friend(&self, user_id: &str) -> bool;
    fn is_favorite(&self, user_id: &str) -> bool;
    fn tag_colour(&self, user_id: &str) -> Option<String>;
    /// Resolve a display name against the cached users.
    fn user_id_by_display_name(&self, display_name: &str) -> Option<String>;
    fn current_user(&self) -> Option<CurrentUser>;
    fn current_travelers(&self) -> Vec<Traveler>;
    fn last_location(&self) -> LastLocation;
}

/// World/group name cache.
///
/// A miss returns `None` and may start a background fetch; the implementation
/// calls `on_ready.request_update(true)` once the cache is warm. Lookups must
/// never block.
pub trait WorldDirectory: Send + Sync {
    fn world_name(&self, world_id: &str, on_ready: &RefreshHandle) -> Option<String>;
    fn group_name(&self, group_id: &str, on_ready: &RefreshHandle) -> Option<String>;
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserTag {
    pub tag: String,
    pub colour: String,
}

/// File-backed social graph exported by the companion app.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SocialSnapshot {
    pub current_user: Option<CurrentUser>,
    pub friends: HashSet<String>,
    pub favorites: HashSet<String>,
    pub tags: HashMap<String, UserTag>,
    /// user id -> display name
    pub users: HashMap<String, String>,
    pub travelers: Vec<Traveler>,
    pub last_location: LastLocation,
    /// world id -> name
    pub worlds: HashMap<String, String>,
    /// group id -> name
    pub groups: HashMap<String, String>,
}

impl SocialSnapshot {
    /// Load from disk. A missing file yields an empty graph.
    pub fn load(path: &Path) -> FeedResult<Self> {
        match std::fs::read_to_string(path) {
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No social snapshot, using empty graph");
                Ok(Self::default())
            }
            Err(e) => Err(e.into()),
        }
    }
}

impl SocialGraph for SocialSnapshot {
    fn is_friend(&self, user_id: &str) -> bool {
        self.friends.contains(user_id)
    }

    fn is_favorite(&self, user_id: &str) -> bool {
        self.favorites.contains(user_id)
    }

    fn tag_colour(&self, user_id: &str) -> Option<String> {
        self.tags.get(user_id).map(|t| t.colour.clone())
    }

    fn user_id_by_display_name(&self, display_name: &str) -> Option<String> {
        self.users
            .iter()
            .find(|(_, name)| name.as_str() == display_name)
            .map(|(id, _)| id.clone())
    }

    fn current_user(&self) -> Option<CurrentUser> {
        self.current_user.clone()
    }

    fn current_travelers(&self) -> Vec<Traveler> {
        self.travelers.clone()
    }

    fn last_location(&self) -> LastLocation {
        self.last_location.clone()
    }
}

// A snapshot has no fetcher: misses stay misses until the next export.
impl WorldDirectory for SocialSnapshot {
    fn world_name(&self, world_id: &str, _on_ready: &RefreshHandle) -> Option<String> {
        let name = self.worlds.get(world_id).cloned();
        if name.is_none() {
            tracing::debug!(world_id, "World not in snapshot cache");
        }
        name
    }

    fn group_name(&self, group_id: &str, _on_ready: &RefreshHandle) -> Option<String> {
        let name = self.groups.get(group_id).cloned();
        if name.is_none() {
            tracing::debug!(group_id, "Group not in snapshot cache");
        }
        name
    }
}
