//! Rows read from the five event tables and the enriched form fed to the wrist.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::FeedError;

/// Entry types the reducers treat specially. Everything else is an opaque
/// filter category.
pub mod kinds {
    // Game log
    pub const LOCATION: &str = "Location";
    pub const LOCATION_DESTINATION: &str = "LocationDestination";
    pub const ON_PLAYER_JOINED: &str = "OnPlayerJoined";
    pub const ON_PLAYER_LEFT: &str = "OnPlayerLeft";
    pub const NOTIFICATION: &str = "Notification";
    pub const BLOCKED_PREFIX: &str = "Blocked";
    pub const MUTED_PREFIX: &str = "Muted";

    // Feed
    pub const GPS: &str = "GPS";
    pub const AVATAR: &str = "Avatar";

    // Friend log
    pub const FRIEND_REQUEST: &str = "FriendRequest";

    // Live travelers
    pub const ON_PLAYER_JOINING: &str = "OnPlayerJoining";

    // Player moderation
    pub const BLOCK: &str = "block";
    pub const MUTE: &str = "mute";

    /// Location value reported for private instances.
    pub const PRIVATE_LOCATION: &str = "private";

    pub fn is_leave_family(kind: &str) -> bool {
        matches!(kind, "OnPlayerLeft" | "BlockedOnPlayerLeft" | "MutedOnPlayerLeft")
    }

    pub fn is_join_family(kind: &str) -> bool {
        matches!(
            kind,
            "OnPlayerJoined" | "BlockedOnPlayerJoined" | "MutedOnPlayerJoined"
        )
    }
}

/// The five event tables feeding the wrist display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    GameLog,
    Feed,
    Notifications,
    FriendLog,
    ModerationAgainst,
}

impl Source {
    /// Fixed reduction order within a pass.
    pub const ALL: [Source; 5] = [
        Source::GameLog,
        Source::Feed,
        Source::Notifications,
        Source::FriendLog,
        Source::ModerationAgainst,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GameLog => "game_log",
            Self::Feed => "feed",
            Self::Notifications => "notifications",
            Self::FriendLog => "friend_log",
            Self::ModerationAgainst => "moderation_against",
        }
    }

    /// Per-source cap applied during the scan.
    pub fn cap(&self) -> usize {
        use crate::constants::*;
        match self {
            Self::GameLog => GAME_LOG_CAP,
            Self::Feed => FEED_CAP,
            Self::Notifications => NOTIFICATION_CAP,
            Self::FriendLog => FRIEND_LOG_CAP,
            Self::ModerationAgainst => MODERATION_CAP,
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Source {
    type Err = FeedError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "game_log" | "gamelog" => Ok(Self::GameLog),
            "feed" => Ok(Self::Feed),
            "notifications" | "notification" => Ok(Self::Notifications),
            "friend_log" | "friendlog" => Ok(Self::FriendLog),
            "moderation_against" | "moderation" => Ok(Self::ModerationAgainst),
            other => Err(FeedError::UnknownSource(other.to_string())),
        }
    }
}

/// One row of any event table.
///
/// For notifications `user_id`/`display_name` hold the sender; for the
/// moderation-against table they hold the user who moderated us.
/// Table-specific columns (message, status, previous name...) ride along in
/// `extra` and are passed through to the wrist payload untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawEntry {
    #[serde(rename = "created_at")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub world_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_name: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl RawEntry {
    pub fn new(kind: &str, created_at: DateTime<Utc>) -> Self {
        Self {
            created_at,
            kind: kind.to_string(),
            user_id: None,
            display_name: None,
            location: None,
            world_name: None,
            group_name: None,
            extra: serde_json::Map::new(),
        }
    }
}

/// A moderation the current user placed on someone (block, mute, ...).
/// Cross-referenced by the game log reducer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerModeration {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub target_user_id: Option<String>,
    pub target_display_name: String,
    #[serde(rename = "created_at")]
    pub created_at: DateTime<Utc>,
}

impl PlayerModeration {
    /// Whether this moderation targets the actor of `entry`.
    pub fn targets(&self, entry: &RawEntry) -> bool {
        let name_match = entry
            .display_name
            .as_deref()
            .is_some_and(|n| n == self.target_display_name);
        let id_match = match (&entry.user_id, &self.target_user_id) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        };
        name_match || id_match
    }
}

/// A raw entry plus relationship state resolved at reduction time.
/// Rebuilt on every pass, never mutated once published.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichedEntry {
    #[serde(flatten)]
    pub entry: RawEntry,
    pub is_friend: bool,
    pub is_favorite: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag_colour: Option<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub is_traveling: bool,
}

impl EnrichedEntry {
    pub fn created_at(&self) -> DateTime<Utc> {
        self.entry.created_at
    }

    pub fn kind(&self) -> &str {
        &self.entry.kind
    }
}
