use std::sync::MutexGuard;

use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::feed::engine::FeedSources;
use crate::feed::entry::{PlayerModeration, RawEntry, Source};
use crate::feed::source::{ModerationLookup, SourceTable};
use crate::storage::database::SharedConnection;
use crate::time_utils;
use crate::{FeedError, FeedResult};

/// Append-only event tables, one per feed source.
pub struct EventLog;

/// Player moderations placed by the current user.
pub struct ModerationStorage;

fn table_name(source: Source) -> &'static str {
    match source {
        Source::GameLog => "gamelog",
        Source::Feed => "feed",
        Source::Notifications => "notifications",
        Source::FriendLog => "friend_log",
        Source::ModerationAgainst => "moderation_against",
    }
}

// ── Row mapping ──

fn timestamp(row: &Row, idx: &str) -> rusqlite::Result<DateTime<Utc>> {
    let s: String = row.get(idx)?;
    time_utils::from_sqlite(&s)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(0, Type::Text, Box::new(e)))
}

fn entry_from_row(source: Source, row: &Row) -> rusqlite::Result<RawEntry> {
    let kind: String = row.get("type")?;
    let extra_json: String = row.get("extra")?;
    let extra: serde_json::Map<String, serde_json::Value> =
        serde_json::from_str(&extra_json).unwrap_or_else(|e| {
            tracing::warn!(
                table = table_name(source),
                kind = %kind,
                error = %e,
                "Corrupt extra column, ignoring it"
            );
            serde_json::Map::new()
        });
    Ok(RawEntry {
        created_at: timestamp(row, "created_at")?,
        kind,
        user_id: row.get("user_id")?,
        display_name: row.get("display_name")?,
        location: row.get("location")?,
        world_name: row.get("world_name")?,
        group_name: row.get("group_name")?,
        extra,
    })
}

fn moderation_from_row(row: &Row) -> rusqlite::Result<PlayerModeration> {
    Ok(PlayerModeration {
        kind: row.get("type")?,
        target_user_id: row.get("target_user_id")?,
        target_display_name: row.get("target_display_name")?,
        created_at: timestamp(row, "created_at")?,
    })
}

impl EventLog {
    /// Append one row. Returns its rowid.
    pub fn insert(conn: &Connection, source: Source, entry: &RawEntry) -> FeedResult<i64> {
        let extra = serde_json::to_string(&entry.extra)?;
        conn.execute(
            &format!(
                "INSERT INTO {} (created_at, type, user_id, display_name, location, world_name, group_name, extra)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                table_name(source)
            ),
            params![
                time_utils::to_sqlite(&entry.created_at),
                entry.kind,
                entry.user_id,
                entry.display_name,
                entry.location,
                entry.world_name,
                entry.group_name,
                extra,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// `created_at` of the last appended row.
    pub fn latest(conn: &Connection, source: Source) -> FeedResult<Option<DateTime<Utc>>> {
        let raw: Option<String> = conn
            .query_row(
                &format!(
                    "SELECT created_at FROM {} ORDER BY id DESC LIMIT 1",
                    table_name(source)
                ),
                [],
                |r| r.get(0),
            )
            .optional()?;
        Ok(raw.map(|s| time_utils::from_sqlite(&s)).transpose()?)
    }

    /// Rows in reverse append order.
    pub fn recent(
        conn: &Connection,
        source: Source,
        limit: Option<usize>,
    ) -> FeedResult<Vec<RawEntry>> {
        // SQLite treats a negative LIMIT as unbounded
        let limit = limit.map(|l| l as i64).unwrap_or(-1);
        let mut stmt = conn.prepare(&format!(
            "SELECT * FROM {} ORDER BY id DESC LIMIT ?1",
            table_name(source)
        ))?;
        let rows = stmt
            .query_map(params![limit], |r| entry_from_row(source, r))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Rows in reverse append order, stopping at the first one older than
    /// `cutoff`. Rows past that point are never read.
    pub fn recent_since(
        conn: &Connection,
        source: Source,
        cutoff: DateTime<Utc>,
    ) -> FeedResult<Vec<RawEntry>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT * FROM {} ORDER BY id DESC",
            table_name(source)
        ))?;
        let mut rows = stmt.query([])?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            let entry = entry_from_row(source, row)?;
            if entry.created_at < cutoff {
                break;
            }
            out.push(entry);
        }
        Ok(out)
    }

    pub fn count(conn: &Connection, source: Source) -> FeedResult<usize> {
        let n: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM {}", table_name(source)),
            [],
            |r| r.get(0),
        )?;
        Ok(n as usize)
    }

    /// Drop rows older than `cutoff`. Returns the number deleted.
    pub fn prune_before(conn: &Connection, source: Source, cutoff: DateTime<Utc>) -> FeedResult<usize> {
        let deleted = conn.execute(
            &format!("DELETE FROM {} WHERE created_at < ?1", table_name(source)),
            params![time_utils::to_sqlite(&cutoff)],
        )?;
        Ok(deleted)
    }

    /// `prune_before` over every event table.
    pub fn prune_all_before(conn: &Connection, cutoff: DateTime<Utc>) -> FeedResult<usize> {
        let mut total = 0;
        for source in Source::ALL {
            let deleted = Self::prune_before(conn, source, cutoff)?;
            if deleted > 0 {
                tracing::debug!(source = %source, deleted, "Pruned event rows");
            }
            total += deleted;
        }
        Ok(total)
    }
}

impl ModerationStorage {
    pub fn insert(conn: &Connection, moderation: &PlayerModeration) -> FeedResult<i64> {
        conn.execute(
            "INSERT INTO player_moderations (type, target_user_id, target_display_name, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                moderation.kind,
                moderation.target_user_id,
                moderation.target_display_name,
                time_utils::to_sqlite(&moderation.created_at),
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn list(conn: &Connection) -> FeedResult<Vec<PlayerModeration>> {
        let mut stmt = conn.prepare("SELECT * FROM player_moderations ORDER BY id")?;
        let rows = stmt
            .query_map([], moderation_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

fn lock(conn: &SharedConnection) -> FeedResult<MutexGuard<'_, Connection>> {
    conn.lock()
        .map_err(|_| FeedError::Storage("connection lock poisoned".into()))
}

/// `SourceTable` over one SQLite event table.
pub struct SqliteTable {
    conn: SharedConnection,
    source: Source,
}

impl SqliteTable {
    pub fn new(conn: SharedConnection, source: Source) -> Self {
        Self { conn, source }
    }
}

impl SourceTable for SqliteTable {
    fn latest(&self) -> FeedResult<Option<DateTime<Utc>>> {
        let conn = lock(&self.conn)?;
        EventLog::latest(&conn, self.source)
    }

    fn recent(&self, limit: Option<usize>) -> FeedResult<Vec<RawEntry>> {
        let conn = lock(&self.conn)?;
        EventLog::recent(&conn, self.source, limit)
    }

    fn recent_since(&self, cutoff: DateTime<Utc>) -> FeedResult<Vec<RawEntry>> {
        let conn = lock(&self.conn)?;
        EventLog::recent_since(&conn, self.source, cutoff)
    }
}

pub struct SqliteModerations {
    conn: SharedConnection,
}

impl SqliteModerations {
    pub fn new(conn: SharedConnection) -> Self {
        Self { conn }
    }
}

impl ModerationLookup for SqliteModerations {
    fn player_moderations(&self) -> FeedResult<Vec<PlayerModeration>> {
        let conn = lock(&self.conn)?;
        ModerationStorage::list(&conn)
    }
}

/// All five sources plus moderations over one shared connection.
pub fn sqlite_sources(conn: SharedConnection) -> FeedSources {
    let table = |source: Source| std::sync::Arc::new(SqliteTable::new(conn.clone(), source));
    FeedSources {
        game_log: table(Source::GameLog),
        feed: table(Source::Feed),
        notifications: table(Source::Notifications),
        friend_log: table(Source::FriendLog),
        moderation_against: table(Source::ModerationAgainst),
        player_moderations: std::sync::Arc::new(SqliteModerations::new(conn.clone())),
    }
}
