//! Wrist filter policies, one per entry category.
//!
//! Persisted in `config.json` under `shared_feed_filters.wrist`.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::FeedError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterPolicy {
    Off,
    On,
    Friends,
    #[serde(rename = "VIP")]
    Vip,
    Everyone,
}

impl FilterPolicy {
    /// Tiered admission used by every source except moderation-against.
    pub fn admits(self, is_friend: bool, is_favorite: bool) -> bool {
        match self {
            Self::Off => false,
            Self::On | Self::Everyone => true,
            Self::Friends => is_friend,
            Self::Vip => is_favorite,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Off => "Off",
            Self::On => "On",
            Self::Friends => "Friends",
            Self::Vip => "VIP",
            Self::Everyone => "Everyone",
        }
    }
}

impl fmt::Display for FilterPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FilterPolicy {
    type Err = FeedError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "off" => Ok(Self::Off),
            "on" => Ok(Self::On),
            "friends" => Ok(Self::Friends),
            "vip" => Ok(Self::Vip),
            "everyone" => Ok(Self::Everyone),
            _ => Err(FeedError::InvalidInput(format!("unknown filter policy '{}'", s))),
        }
    }
}

/// Category -> policy table. Missing categories behave as `Off`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WristFilters(BTreeMap<String, FilterPolicy>);

impl WristFilters {
    pub fn empty() -> Self {
        Self(BTreeMap::new())
    }

    pub fn get(&self, category: &str) -> Option<FilterPolicy> {
        self.0.get(category).copied()
    }

    pub fn set(&mut self, category: &str, policy: FilterPolicy) {
        self.0.insert(category.to_string(), policy);
    }

    pub fn with(mut self, category: &str, policy: FilterPolicy) -> Self {
        self.set(category, policy);
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, FilterPolicy)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Tiered check: Off/absent drop, On/Everyone keep, Friends/VIP gate.
    pub fn admits(&self, category: &str, is_friend: bool, is_favorite: bool) -> bool {
        self.get(category)
            .is_some_and(|p| p.admits(is_friend, is_favorite))
    }

    /// Binary check for sources without friend tiers: only `On` keeps.
    pub fn admits_on_only(&self, category: &str) -> bool {
        self.get(category) == Some(FilterPolicy::On)
    }
}

impl Default for WristFilters {
    fn default() -> Self {
        use FilterPolicy::*;
        let table: &[(&str, FilterPolicy)] = &[
            // Game log
            ("Location", On),
            ("OnPlayerJoined", Everyone),
            ("OnPlayerLeft", Everyone),
            ("OnPlayerJoining", Friends),
            ("PortalSpawn", Everyone),
            ("AvatarChange", Off),
            ("VideoPlay", On),
            ("Event", On),
            ("External", On),
            ("BlockedOnPlayerJoined", Off),
            ("BlockedOnPlayerLeft", Off),
            ("MutedOnPlayerJoined", Off),
            ("MutedOnPlayerLeft", Off),
            // Feed
            ("GPS", Friends),
            ("Online", Friends),
            ("Offline", Friends),
            ("Status", Friends),
            ("Bio", Off),
            // Notifications
            ("invite", Friends),
            ("requestInvite", Friends),
            ("inviteResponse", Friends),
            ("requestInviteResponse", Friends),
            ("friendRequest", On),
            ("boop", On),
            ("group.announcement", On),
            ("group.invite", On),
            ("group.joinRequest", Off),
            ("group.queueReady", On),
            ("instance.closed", On),
            // Friend log
            ("Friend", On),
            ("Unfriend", On),
            ("DisplayName", Friends),
            ("TrustLevel", Friends),
            // Moderation against
            ("Blocked", On),
            ("Unblocked", On),
            ("Muted", On),
            ("Unmuted", On),
        ];
        Self(
            table
                .iter()
                .map(|(k, v)| (k.to_string(), *v))
                .collect(),
        )
    }
}
