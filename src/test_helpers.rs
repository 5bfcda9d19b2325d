//! Shared test utilities: builders, stub collaborators, DB setup, time helpers.
//!
//! Available only under `#[cfg(test)]`.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};
use rusqlite::Connection;

use crate::config::FeedConfig;
use crate::feed::engine::{FeedEngine, FeedSources};
use crate::feed::entry::{EnrichedEntry, PlayerModeration, RawEntry};
use crate::feed::filters::WristFilters;
use crate::feed::reducers::ReduceContext;
use crate::feed::scheduler::RefreshHandle;
use crate::feed::source::{MemoryModerations, MemoryTable, SourceTable};
use crate::sink::RenderSink;
use crate::social::{CurrentUser, LastLocation, SocialGraph, Traveler, WorldDirectory};
use crate::storage::migrations;
use crate::{time_utils, FeedError, FeedResult};

// ============================================================================
// RawEntryBuilder
// ============================================================================

pub struct RawEntryBuilder {
    entry: RawEntry,
}

impl RawEntryBuilder {
    /// Row of `kind` created now, no actor.
    pub fn new(kind: &str) -> Self {
        Self {
            entry: RawEntry::new(kind, time_utils::now()),
        }
    }

    /// Actor by id and display name.
    pub fn user(mut self, user_id: &str, display_name: &str) -> Self {
        self.entry.user_id = Some(user_id.to_string());
        self.entry.display_name = Some(display_name.to_string());
        self
    }

    /// Actor by display name only (game log rows).
    pub fn display_name(mut self, display_name: &str) -> Self {
        self.entry.display_name = Some(display_name.to_string());
        self
    }

    pub fn location(mut self, location: &str) -> Self {
        self.entry.location = Some(location.to_string());
        self
    }

    pub fn at(mut self, created_at: DateTime<Utc>) -> Self {
        self.entry.created_at = created_at;
        self
    }

    pub fn build(self) -> RawEntry {
        self.entry
    }
}

// ============================================================================
// Time + entry helpers
// ============================================================================

pub fn minutes_ago(minutes: i64) -> DateTime<Utc> {
    time_utils::now() - Duration::minutes(minutes)
}

/// Enriched entry with no relationship state.
pub fn enriched(kind: &str, created_at: DateTime<Utc>) -> EnrichedEntry {
    EnrichedEntry {
        entry: RawEntry::new(kind, created_at),
        is_friend: false,
        is_favorite: false,
        tag_colour: None,
        is_traveling: false,
    }
}

/// Moderation placed by the current user on `target_display_name`.
pub fn moderation(kind: &str, target_display_name: &str) -> PlayerModeration {
    PlayerModeration {
        kind: kind.to_string(),
        target_user_id: None,
        target_display_name: target_display_name.to_string(),
        created_at: minutes_ago(60),
    }
}

/// Reducer context at `now`, private rows shown, no notification queue.
pub fn context<'a>(
    filters: &'a WristFilters,
    social: &'a StubSocial,
    force: bool,
) -> ReduceContext<'a> {
    ReduceContext {
        now: time_utils::now(),
        force,
        filters,
        hide_private: false,
        social,
        current_user: social.current_user(),
        noty: None,
    }
}

// ============================================================================
// StubSocial
// ============================================================================

#[derive(Debug, Default)]
pub struct StubSocial {
    friends: HashSet<String>,
    favorites: HashSet<String>,
    tags: HashMap<String, String>,
    users: HashMap<String, String>,
    me: Option<CurrentUser>,
    travelers: Vec<Traveler>,
    here: LastLocation,
}

impl StubSocial {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn friend(mut self, user_id: &str) -> Self {
        self.friends.insert(user_id.to_string());
        self
    }

    pub fn favorite(mut self, user_id: &str) -> Self {
        self.favorites.insert(user_id.to_string());
        self
    }

    pub fn tag(mut self, user_id: &str, colour: &str) -> Self {
        self.tags.insert(user_id.to_string(), colour.to_string());
        self
    }

    /// Cached user, resolvable by display name.
    pub fn known_user(mut self, user_id: &str, display_name: &str) -> Self {
        self.users.insert(user_id.to_string(), display_name.to_string());
        self
    }

    /// The logged-in user.
    pub fn me(mut self, user_id: &str, display_name: &str) -> Self {
        self.me = Some(CurrentUser {
            id: user_id.to_string(),
            display_name: display_name.to_string(),
        });
        self
    }

    /// Our current instance and the players already in it.
    pub fn here(mut self, location: &str, player_ids: &[&str]) -> Self {
        self.here = LastLocation {
            location: location.to_string(),
            player_ids: player_ids.iter().map(|s| s.to_string()).collect(),
        };
        self
    }

    pub fn traveler(mut self, traveler: Traveler) -> Self {
        self.travelers.push(traveler);
        self
    }
}

impl SocialGraph for StubSocial {
    fn is_friend(&self, user_id: &str) -> bool {
        self.friends.contains(user_id)
    }

    fn is_favorite(&self, user_id: &str) -> bool {
        self.favorites.contains(user_id)
    }

    fn tag_colour(&self, user_id: &str) -> Option<String> {
        self.tags.get(user_id).cloned()
    }

    fn user_id_by_display_name(&self, display_name: &str) -> Option<String> {
        self.users
            .iter()
            .find(|(_, name)| name.as_str() == display_name)
            .map(|(id, _)| id.clone())
    }

    fn current_user(&self) -> Option<CurrentUser> {
        self.me.clone()
    }

    fn current_travelers(&self) -> Vec<Traveler> {
        self.travelers.clone()
    }

    fn last_location(&self) -> LastLocation {
        self.here.clone()
    }
}

// ============================================================================
// StubDirectory
// ============================================================================

/// World/group cache that records misses.
#[derive(Debug, Default)]
pub struct StubDirectory {
    worlds: HashMap<String, String>,
    groups: HashMap<String, String>,
    world_misses: Mutex<Vec<String>>,
    group_misses: Mutex<Vec<String>>,
}

impl StubDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn world(mut self, world_id: &str, name: &str) -> Self {
        self.worlds.insert(world_id.to_string(), name.to_string());
        self
    }

    pub fn group(mut self, group_id: &str, name: &str) -> Self {
        self.groups.insert(group_id.to_string(), name.to_string());
        self
    }

    pub fn world_misses(&self) -> Vec<String> {
        self.world_misses.lock().unwrap().clone()
    }

    pub fn group_misses(&self) -> Vec<String> {
        self.group_misses.lock().unwrap().clone()
    }
}

impl WorldDirectory for StubDirectory {
    fn world_name(&self, world_id: &str, _on_ready: &RefreshHandle) -> Option<String> {
        let name = self.worlds.get(world_id).cloned();
        if name.is_none() {
            self.world_misses.lock().unwrap().push(world_id.to_string());
        }
        name
    }

    fn group_name(&self, group_id: &str, _on_ready: &RefreshHandle) -> Option<String> {
        let name = self.groups.get(group_id).cloned();
        if name.is_none() {
            self.group_misses.lock().unwrap().push(group_id.to_string());
        }
        name
    }
}

// ============================================================================
// WarmingDirectory
// ============================================================================

/// World cache with a pretend background fetcher: a miss keeps the refresh
/// handle, `warm` fills the cache and fires it.
#[derive(Debug, Default)]
pub struct WarmingDirectory {
    worlds: Mutex<HashMap<String, String>>,
    waiting: Mutex<Option<RefreshHandle>>,
}

impl WarmingDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_waiting(&self) -> bool {
        self.waiting.lock().unwrap().is_some()
    }

    /// Fetch completed.
    pub fn warm(&self, world_id: &str, name: &str) {
        self.worlds
            .lock()
            .unwrap()
            .insert(world_id.to_string(), name.to_string());
        let handle = self.waiting.lock().unwrap().take();
        if let Some(handle) = handle {
            handle.request_update(true);
        }
    }
}

impl WorldDirectory for WarmingDirectory {
    fn world_name(&self, world_id: &str, on_ready: &RefreshHandle) -> Option<String> {
        let name = self.worlds.lock().unwrap().get(world_id).cloned();
        if name.is_none() {
            *self.waiting.lock().unwrap() = Some(on_ready.clone());
        }
        name
    }

    fn group_name(&self, _group_id: &str, _on_ready: &RefreshHandle) -> Option<String> {
        None
    }
}

// ============================================================================
// RecordingSink
// ============================================================================

#[derive(Debug, Default)]
pub struct RecordingSink {
    payloads: Mutex<Vec<String>>,
    dialog_refreshes: AtomicUsize,
}

impl RecordingSink {
    pub fn payloads(&self) -> Vec<String> {
        self.payloads.lock().unwrap().clone()
    }

    pub fn last_payload(&self) -> Option<String> {
        self.payloads.lock().unwrap().last().cloned()
    }

    pub fn render_count(&self) -> usize {
        self.payloads.lock().unwrap().len()
    }

    /// Total dialog refresher calls (three per publish).
    pub fn dialog_refreshes(&self) -> usize {
        self.dialog_refreshes.load(Ordering::SeqCst)
    }
}

impl RenderSink for RecordingSink {
    fn render_wrist_feed(&self, payload: &str) {
        self.payloads.lock().unwrap().push(payload.to_string());
    }

    fn apply_user_dialog_instances(&self) {
        self.dialog_refreshes.fetch_add(1, Ordering::SeqCst);
    }

    fn apply_world_dialog_instances(&self) {
        self.dialog_refreshes.fetch_add(1, Ordering::SeqCst);
    }

    fn apply_group_dialog_instances(&self) {
        self.dialog_refreshes.fetch_add(1, Ordering::SeqCst);
    }
}

// ============================================================================
// Broken tables
// ============================================================================

/// Table whose reads always fail.
pub struct FailingTable;

impl SourceTable for FailingTable {
    fn latest(&self) -> FeedResult<Option<DateTime<Utc>>> {
        Err(FeedError::Storage("table unavailable".into()))
    }

    fn recent(&self, _limit: Option<usize>) -> FeedResult<Vec<RawEntry>> {
        Err(FeedError::Storage("table unavailable".into()))
    }
}

/// Table whose reads panic.
pub struct PanickingTable;

impl SourceTable for PanickingTable {
    fn latest(&self) -> FeedResult<Option<DateTime<Utc>>> {
        panic!("table reader panicked")
    }

    fn recent(&self, _limit: Option<usize>) -> FeedResult<Vec<RawEntry>> {
        panic!("table reader panicked")
    }
}

// ============================================================================
// EngineHarness
// ============================================================================

/// In-memory tables and stub collaborators wired into `FeedSources`.
/// Swap entries of `sources` before calling `engine()` to inject failures.
pub struct EngineHarness {
    pub game_log: Arc<MemoryTable>,
    pub feed: Arc<MemoryTable>,
    pub notifications: Arc<MemoryTable>,
    pub friend_log: Arc<MemoryTable>,
    pub moderation_against: Arc<MemoryTable>,
    pub moderations: Arc<MemoryModerations>,
    pub sources: FeedSources,
    pub social: Arc<StubSocial>,
    pub directory: Arc<StubDirectory>,
    pub sink: Arc<RecordingSink>,
}

impl EngineHarness {
    pub fn new(social: StubSocial) -> Self {
        let game_log = Arc::new(MemoryTable::new());
        let feed = Arc::new(MemoryTable::new());
        let notifications = Arc::new(MemoryTable::new());
        let friend_log = Arc::new(MemoryTable::new());
        let moderation_against = Arc::new(MemoryTable::new());
        let moderations = Arc::new(MemoryModerations::default());
        let sources = FeedSources {
            game_log: game_log.clone(),
            feed: feed.clone(),
            notifications: notifications.clone(),
            friend_log: friend_log.clone(),
            moderation_against: moderation_against.clone(),
            player_moderations: moderations.clone(),
        };
        Self {
            game_log,
            feed,
            notifications,
            friend_log,
            moderation_against,
            moderations,
            sources,
            social: Arc::new(social),
            directory: Arc::new(StubDirectory::new()),
            sink: Arc::new(RecordingSink::default()),
        }
    }

    pub fn engine(&self, filters: WristFilters) -> FeedEngine {
        let mut config = FeedConfig::default();
        config.shared_feed_filters.wrist = filters;
        FeedEngine::new(
            self.sources.clone(),
            self.social.clone(),
            self.directory.clone(),
            self.sink.clone(),
            config,
        )
    }
}

// ============================================================================
// DB setup
// ============================================================================

/// In-memory feed DB with all migrations applied.
pub fn setup_feed_db() -> Connection {
    let conn = Connection::open(":memory:").unwrap();
    conn.execute_batch("PRAGMA journal_mode=WAL;").unwrap();
    migrations::migrate_feed_db(&conn).unwrap();
    conn
}
