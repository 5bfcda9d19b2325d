//! Append-only event tables as seen by the reducers.

use std::sync::RwLock;

use chrono::{DateTime, Utc};

use super::entry::{PlayerModeration, RawEntry};
use crate::{FeedError, FeedResult};

/// One event table, appended in (roughly) time order.
pub trait SourceTable: Send + Sync {
    /// `created_at` of the most recently appended row.
    fn latest(&self) -> FeedResult<Option<DateTime<Utc>>>;

    /// Rows newest-first, at most `limit` when given.
    fn recent(&self, limit: Option<usize>) -> FeedResult<Vec<RawEntry>>;

    /// Rows newest-first, stopping at the first one older than `cutoff`.
    fn recent_since(&self, cutoff: DateTime<Utc>) -> FeedResult<Vec<RawEntry>> {
        Ok(self
            .recent(None)?
            .into_iter()
            .take_while(|r| r.created_at >= cutoff)
            .collect())
    }
}

/// Moderations the current user placed on others.
pub trait ModerationLookup: Send + Sync {
    fn player_moderations(&self) -> FeedResult<Vec<PlayerModeration>>;
}

/// In-process table. The live game log session is kept this way.
#[derive(Debug, Default)]
pub struct MemoryTable {
    rows: RwLock<Vec<RawEntry>>,
}

impl MemoryTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_rows(rows: Vec<RawEntry>) -> Self {
        Self { rows: RwLock::new(rows) }
    }

    pub fn append(&self, entry: RawEntry) -> FeedResult<()> {
        self.rows
            .write()
            .map_err(|_| FeedError::Storage("memory table lock poisoned".into()))?
            .push(entry);
        Ok(())
    }

    pub fn clear(&self) -> FeedResult<()> {
        self.rows
            .write()
            .map_err(|_| FeedError::Storage("memory table lock poisoned".into()))?
            .clear();
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.rows.read().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SourceTable for MemoryTable {
    fn latest(&self) -> FeedResult<Option<DateTime<Utc>>> {
        let rows = self
            .rows
            .read()
            .map_err(|_| FeedError::Storage("memory table lock poisoned".into()))?;
        Ok(rows.last().map(|r| r.created_at))
    }

    fn recent(&self, limit: Option<usize>) -> FeedResult<Vec<RawEntry>> {
        let rows = self
            .rows
            .read()
            .map_err(|_| FeedError::Storage("memory table lock poisoned".into()))?;
        let take = limit.unwrap_or(rows.len());
        Ok(rows.iter().rev().take(take).cloned().collect())
    }

    fn recent_since(&self, cutoff: DateTime<Utc>) -> FeedResult<Vec<RawEntry>> {
        let rows = self
            .rows
            .read()
            .map_err(|_| FeedError::Storage("memory table lock poisoned".into()))?;
        Ok(rows
            .iter()
            .rev()
            .take_while(|r| r.created_at >= cutoff)
            .cloned()
            .collect())
    }
}

#[derive(Debug, Default)]
pub struct MemoryModerations {
    rows: RwLock<Vec<PlayerModeration>>,
}

impl MemoryModerations {
    pub fn new(rows: Vec<PlayerModeration>) -> Self {
        Self { rows: RwLock::new(rows) }
    }

    pub fn push(&self, moderation: PlayerModeration) -> FeedResult<()> {
        self.rows
            .write()
            .map_err(|_| FeedError::Storage("moderation lock poisoned".into()))?
            .push(moderation);
        Ok(())
    }
}

impl ModerationLookup for MemoryModerations {
    fn player_moderations(&self) -> FeedResult<Vec<PlayerModeration>> {
        self.rows
            .read()
            .map(|r| r.clone())
            .map_err(|_| FeedError::Storage("moderation lock poisoned".into()))
    }
}
