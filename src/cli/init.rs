use anyhow::{Context, Result};
use wristfeed::config::FeedConfig;
use wristfeed::storage::database::{open_connection, ConnectionRole};
use wristfeed::storage::migrations;
use wristfeed::storage::path_utils;

/// `init`: create the data directory, the event DB and a default config.
pub fn run() -> Result<()> {
    let data_dir = path_utils::data_dir();
    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("Failed to create {}", data_dir.display()))?;

    let db_path = path_utils::feed_db_path();
    let conn = open_connection(&db_path, ConnectionRole::Cli)
        .context("Failed to open feed database")?;
    let version = migrations::get_schema_version(&conn)?;

    let config_path = path_utils::config_path();
    let created = if config_path.exists() {
        false
    } else {
        FeedConfig::default()
            .save_to(&config_path)
            .context("Failed to write default config")?;
        true
    };

    println!("wristfeed initialized");
    println!("  Data dir:  {}", data_dir.display());
    println!("  Database:  {} (schema v{})", db_path.display(), version);
    println!(
        "  Config:    {}{}",
        config_path.display(),
        if created { " (created)" } else { "" }
    );
    println!("  Snapshot:  {}", path_utils::social_snapshot_path().display());
    println!("  Output:    {}", FeedConfig::load().wrist_feed_path().display());
    Ok(())
}
