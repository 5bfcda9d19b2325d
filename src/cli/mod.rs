pub mod filters;
pub mod ingest;
pub mod init;
pub mod snapshot;
pub mod watch;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use wristfeed::config::FeedConfig;
use wristfeed::feed::FeedEngine;
use wristfeed::sink::{LogNotificationQueue, RenderSink};
use wristfeed::social::SocialSnapshot;
use wristfeed::storage::database::{open_shared, ConnectionRole};
use wristfeed::storage::event_log::sqlite_sources;
use wristfeed::storage::path_utils;

/// Engine over the on-disk event DB and the exported social snapshot.
pub fn build_engine(role: ConnectionRole, sink: Arc<dyn RenderSink>) -> Result<FeedEngine> {
    let config = FeedConfig::load();
    let db_path = path_utils::feed_db_path();
    let conn = open_shared(&db_path, role)
        .with_context(|| format!("Failed to open feed database {}", db_path.display()))?;
    let social = Arc::new(load_social(&path_utils::social_snapshot_path())?);

    Ok(
        FeedEngine::new(sqlite_sources(conn), social.clone(), social, sink, config)
            .with_notifications(Arc::new(LogNotificationQueue::new()))
            .with_config_path(path_utils::config_path()),
    )
}

pub fn load_social(path: &Path) -> Result<SocialSnapshot> {
    SocialSnapshot::load(path)
        .with_context(|| format!("Failed to load social snapshot {}", path.display()))
}

/// Inline JSON, `@path` for a file, or `-` for stdin.
pub fn read_json_arg(arg: &str) -> Result<String> {
    if arg == "-" {
        let mut buf = String::new();
        std::io::Read::read_to_string(&mut std::io::stdin(), &mut buf)
            .context("Failed to read stdin")?;
        Ok(buf)
    } else if let Some(path) = arg.strip_prefix('@') {
        std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path))
    } else {
        Ok(arg.to_string())
    }
}
