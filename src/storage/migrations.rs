use rusqlite::Connection;

use crate::{FeedError, FeedResult};

/// Current schema version
pub const CURRENT_SCHEMA_VERSION: u32 = 1;

/// Current schema version of a database (0 if never migrated).
pub fn get_schema_version(conn: &Connection) -> FeedResult<u32> {
    let exists: bool = conn
        .query_row(
            "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type='table' AND name='schema_version'",
            [],
            |r| r.get(0),
        )
        .map_err(|e| FeedError::Storage(e.to_string()))?;

    if !exists {
        return Ok(0);
    }

    let version: u32 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_version",
            [],
            |r| r.get(0),
        )
        .map_err(|e| FeedError::Storage(e.to_string()))?;

    Ok(version)
}

fn set_schema_version(conn: &Connection, version: u32) -> FeedResult<()> {
    conn.execute(
        "INSERT OR REPLACE INTO schema_version (version, applied_at) VALUES (?1, datetime('now'))",
        rusqlite::params![version],
    )
    .map_err(|e| FeedError::Storage(e.to_string()))?;
    Ok(())
}

// ── Feed DB ──

/// Five append-only event tables share one row shape. Columns that only
/// some tables carry (message, previous name, ...) live in `extra` as JSON.
const FEED_DB_V1: &str = "
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS gamelog (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    created_at TEXT NOT NULL,
    type TEXT NOT NULL,
    user_id TEXT,
    display_name TEXT,
    location TEXT,
    world_name TEXT,
    group_name TEXT,
    extra TEXT NOT NULL DEFAULT '{}'
);
CREATE INDEX IF NOT EXISTS idx_gamelog_created ON gamelog(created_at);

CREATE TABLE IF NOT EXISTS feed (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    created_at TEXT NOT NULL,
    type TEXT NOT NULL,
    user_id TEXT,
    display_name TEXT,
    location TEXT,
    world_name TEXT,
    group_name TEXT,
    extra TEXT NOT NULL DEFAULT '{}'
);
CREATE INDEX IF NOT EXISTS idx_feed_created ON feed(created_at);

CREATE TABLE IF NOT EXISTS notifications (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    created_at TEXT NOT NULL,
    type TEXT NOT NULL,
    user_id TEXT,
    display_name TEXT,
    location TEXT,
    world_name TEXT,
    group_name TEXT,
    extra TEXT NOT NULL DEFAULT '{}'
);
CREATE INDEX IF NOT EXISTS idx_notifications_created ON notifications(created_at);

CREATE TABLE IF NOT EXISTS friend_log (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    created_at TEXT NOT NULL,
    type TEXT NOT NULL,
    user_id TEXT,
    display_name TEXT,
    location TEXT,
    world_name TEXT,
    group_name TEXT,
    extra TEXT NOT NULL DEFAULT '{}'
);
CREATE INDEX IF NOT EXISTS idx_friend_log_created ON friend_log(created_at);

CREATE TABLE IF NOT EXISTS moderation_against (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    created_at TEXT NOT NULL,
    type TEXT NOT NULL,
    user_id TEXT,
    display_name TEXT,
    location TEXT,
    world_name TEXT,
    group_name TEXT,
    extra TEXT NOT NULL DEFAULT '{}'
);
CREATE INDEX IF NOT EXISTS idx_moderation_against_created ON moderation_against(created_at);

-- Moderations the current user placed on others
CREATE TABLE IF NOT EXISTS player_moderations (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    type TEXT NOT NULL,
    target_user_id TEXT,
    target_display_name TEXT NOT NULL,
    created_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_player_moderations_target ON player_moderations(target_display_name);
";

/// Create the feed schema on a fresh database. Databases from a newer
/// build are refused.
pub fn migrate_feed_db(conn: &Connection) -> FeedResult<()> {
    let version = get_schema_version(conn)?;

    if version > CURRENT_SCHEMA_VERSION {
        return Err(FeedError::Storage(format!(
            "Feed DB schema v{} is newer than supported v{}",
            version, CURRENT_SCHEMA_VERSION
        )));
    }

    if version < 1 {
        conn.execute_batch(FEED_DB_V1)
            .map_err(|e| FeedError::Storage(format!("Feed DB V1 schema failed: {}", e)))?;
        set_schema_version(conn, 1)?;
        tracing::info!(version = CURRENT_SCHEMA_VERSION, "Feed DB schema created");
    }

    Ok(())
}
