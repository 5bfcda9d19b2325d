use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use wristfeed::feed::entry::{PlayerModeration, RawEntry, Source};
use wristfeed::storage::database::{open_connection, ConnectionRole};
use wristfeed::storage::event_log::{EventLog, ModerationStorage};
use wristfeed::storage::path_utils;

use super::read_json_arg;

/// Pseudo-source for moderations the current user placed.
const PLAYER_MODERATIONS: &str = "player_moderations";

/// `ingest <source> <json>`: append one row or an array of rows.
pub fn run(source: &str, json: &str) -> Result<()> {
    let body = read_json_arg(json)?;
    let mut conn = open_connection(&path_utils::feed_db_path(), ConnectionRole::Cli)
        .context("Failed to open feed database")?;
    let tx = conn.transaction()?;

    let (count, target) = if source == PLAYER_MODERATIONS {
        let rows: Vec<PlayerModeration> = one_or_many(&body)?;
        for row in &rows {
            ModerationStorage::insert(&tx, row)?;
        }
        (rows.len(), PLAYER_MODERATIONS.to_string())
    } else {
        let source: Source = source.parse()?;
        let rows: Vec<RawEntry> = one_or_many(&body)?;
        for row in &rows {
            EventLog::insert(&tx, source, row)?;
        }
        (rows.len(), source.to_string())
    };

    tx.commit()?;
    tracing::info!(source = %target, count, "Rows ingested");
    println!("Ingested {} row(s) into {}", count, target);
    Ok(())
}

fn one_or_many<T: DeserializeOwned>(body: &str) -> Result<Vec<T>> {
    let value: serde_json::Value = serde_json::from_str(body).context("Invalid JSON")?;
    let rows = if value.is_array() {
        serde_json::from_value(value)?
    } else {
        vec![serde_json::from_value(value)?]
    };
    Ok(rows)
}
