use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

use anyhow::{Context, Result};
use rusqlite::Connection;
use wristfeed::config::FeedConfig;
use wristfeed::constants::PRUNE_INTERVAL_SECS;
use wristfeed::feed::FeedScheduler;
use wristfeed::sink::FileSink;
use wristfeed::storage::database::{open_connection, ConnectionRole};
use wristfeed::storage::event_log::EventLog;
use wristfeed::storage::path_utils;
use wristfeed::time_utils;

use super::{build_engine, load_social};

const TICK: Duration = Duration::from_millis(200);

fn modified(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path).and_then(|m| m.modified()).ok()
}

fn prune(conn: &Connection, config: &FeedConfig) {
    let Some(cutoff) = config.retention_cutoff(time_utils::now()) else {
        return;
    };
    match EventLog::prune_all_before(conn, cutoff) {
        Ok(0) => {}
        Ok(deleted) => tracing::info!(deleted, cutoff = %cutoff, "Pruned old event rows"),
        Err(e) => tracing::warn!(error = %e, "Event prune failed"),
    }
}

/// `watch`: poll the event DB and keep the wrist feed file current until
/// SIGINT/SIGTERM.
pub fn run(interval_secs: u64) -> Result<()> {
    let mut config = FeedConfig::load();
    let out = config.wrist_feed_path();
    let engine = build_engine(ConnectionRole::Watch, Arc::new(FileSink::new(&out)))?;
    let scheduler = FeedScheduler::new(engine);

    let db_path = path_utils::feed_db_path();
    let maintenance = open_connection(&db_path, ConnectionRole::Watch)
        .with_context(|| format!("Failed to open feed database {}", db_path.display()))?;
    prune(&maintenance, &config);
    let prune_interval = Duration::from_secs(PRUNE_INTERVAL_SECS);
    let mut last_prune = Instant::now();

    let config_path = path_utils::config_path();
    let social_path = path_utils::social_snapshot_path();
    let mut config_mtime = modified(&config_path);
    let mut social_mtime = modified(&social_path);

    let shutdown = Arc::new(AtomicBool::new(false));
    signal_hook::flag::register(signal_hook::consts::SIGINT, shutdown.clone())?;
    #[cfg(unix)]
    signal_hook::flag::register(signal_hook::consts::SIGTERM, shutdown.clone())?;

    tracing::info!(
        output = %out.display(),
        interval_secs,
        debounce_ms = config.debounce_ms,
        "Watching feed database"
    );
    println!("Writing wrist feed to {} (Ctrl-C to stop)", out.display());

    scheduler.set_ready(true);
    scheduler.request_update(true);

    let interval = Duration::from_secs(interval_secs.max(1));
    let mut last_poll = Instant::now();
    while !shutdown.load(Ordering::Relaxed) {
        std::thread::sleep(TICK);
        if last_poll.elapsed() < interval {
            continue;
        }
        last_poll = Instant::now();

        let mtime = modified(&config_path);
        if mtime != config_mtime {
            config_mtime = mtime;
            tracing::info!(path = %config_path.display(), "Config changed, reloading");
            config = FeedConfig::load();
            scheduler.reload_config(config.clone());
        }

        if last_prune.elapsed() >= prune_interval {
            last_prune = Instant::now();
            prune(&maintenance, &config);
        }

        let mtime = modified(&social_path);
        if mtime != social_mtime {
            social_mtime = mtime;
            match load_social(&social_path) {
                Ok(social) => {
                    tracing::info!(path = %social_path.display(), "Social snapshot changed, reloading");
                    let social = Arc::new(social);
                    scheduler.replace_social(social.clone(), social);
                }
                Err(e) => tracing::warn!(error = %e, "Keeping previous social snapshot"),
            }
        }

        scheduler.request_update(false);
    }

    let stats = scheduler.stats();
    tracing::info!(
        passes = stats.passes,
        forced = stats.forced,
        failed = stats.failed,
        "Watch stopped"
    );
    Ok(())
}
