//! Shared tracing initialization.
//!
//! Long-running commands (`watch`) append to `{data_dir}/wristfeed.log`;
//! one-shot CLI commands log to stderr so their stdout stays machine-readable.

use std::sync::Mutex;

use crate::storage::path_utils;

fn env_filter() -> tracing_subscriber::EnvFilter {
    use tracing_subscriber::EnvFilter;
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Initialize global tracing to `{data_dir}/wristfeed.log` (append mode).
pub fn init_file_tracing() {
    let data_dir = path_utils::data_dir();
    std::fs::create_dir_all(&data_dir).ok();
    let log_path = path_utils::log_path();

    let log_file = match std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
    {
        Ok(f) => f,
        Err(e) => {
            eprintln!("Cannot open {}: {} (logging to stderr)", log_path.display(), e);
            init_stderr_tracing();
            return;
        }
    };

    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(Mutex::new(log_file))
        .with_target(true)
        .with_ansi(false)
        .try_init();
}

/// Initialize tracing to stderr (interactive CLI commands).
pub fn init_stderr_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
