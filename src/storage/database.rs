use std::path::Path;
use std::sync::{Arc, Mutex};

use rusqlite::Connection;

use crate::constants::{CLI_WAL_AUTOCHECKPOINT, SQLITE_BUSY_TIMEOUT_MS, WATCH_WAL_AUTOCHECKPOINT};
use crate::storage::migrations;
use crate::{FeedError, FeedResult};

/// One connection shared by every table reader of a scheduler.
pub type SharedConnection = Arc<Mutex<Connection>>;

/// Who opens the database; drives the checkpoint policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionRole {
    Watch, // long-lived, checkpoints
    Cli,   // one-shot, leaves checkpointing to the watcher
}

/// Open the event database with pragmas set and migrations applied.
pub fn open_connection(path: &Path, role: ConnectionRole) -> FeedResult<Connection> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let conn = Connection::open(path)
        .map_err(|e| FeedError::Storage(format!("Failed to open {}: {}", path.display(), e)))?;

    tracing::debug!(path = %path.display(), role = ?role, "Database connection opened");

    configure_common(&conn)?;
    let autocheckpoint = match role {
        ConnectionRole::Watch => WATCH_WAL_AUTOCHECKPOINT,
        ConnectionRole::Cli => CLI_WAL_AUTOCHECKPOINT,
    };
    conn.execute_batch(&format!("PRAGMA wal_autocheckpoint = {};", autocheckpoint))
        .map_err(|e| FeedError::Storage(format!("Failed to configure {:?} pragmas: {}", role, e)))?;

    migrations::migrate_feed_db(&conn)?;
    Ok(conn)
}

/// `open_connection` wrapped for sharing across table readers.
pub fn open_shared(path: &Path, role: ConnectionRole) -> FeedResult<SharedConnection> {
    Ok(Arc::new(Mutex::new(open_connection(path, role)?)))
}

/// Pragmas for every connection:
/// - journal_mode = WAL
/// - busy_timeout = SQLITE_BUSY_TIMEOUT_MS
/// - synchronous = NORMAL
/// - temp_store = MEMORY
fn configure_common(conn: &Connection) -> FeedResult<()> {
    conn.execute_batch(&format!(
        "PRAGMA journal_mode = WAL;
         PRAGMA busy_timeout = {};
         PRAGMA synchronous = NORMAL;
         PRAGMA temp_store = MEMORY;",
        SQLITE_BUSY_TIMEOUT_MS,
    ))
    .map_err(|e| FeedError::Storage(format!("Failed to configure pragmas: {}", e)))?;
    Ok(())
}
