use std::path::PathBuf;

/// Env override for the data directory (tests, portable installs).
pub const DATA_DIR_ENV: &str = "WRISTFEED_DATA_DIR";

/// Centralized cross-platform data directory.
/// Linux: ~/.config/wristfeed/
/// macOS: ~/Library/Application Support/wristfeed/
/// Windows: %APPDATA%/wristfeed/
pub fn data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
        if !dir.is_empty() {
            return PathBuf::from(expand_tilde(&dir));
        }
    }
    let base = dirs::config_dir().unwrap_or_else(|| {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".config")
    });
    base.join("wristfeed")
}

/// Event database: {data_dir}/feed.db
pub fn feed_db_path() -> PathBuf {
    data_dir().join("feed.db")
}

/// Settings file: {data_dir}/config.json
pub fn config_path() -> PathBuf {
    data_dir().join("config.json")
}

/// Social graph snapshot written by the companion app: {data_dir}/social.json
pub fn social_snapshot_path() -> PathBuf {
    data_dir().join("social.json")
}

/// Default wrist payload output: {data_dir}/wrist_feed.json
pub fn wrist_feed_path() -> PathBuf {
    data_dir().join("wrist_feed.json")
}

/// Log file: {data_dir}/wristfeed.log
pub fn log_path() -> PathBuf {
    data_dir().join("wristfeed.log")
}

/// Expand ~ to home directory in paths.
pub fn expand_tilde(path: &str) -> String {
    if path.starts_with("~/") || path == "~" {
        if let Some(home) = dirs::home_dir() {
            return path.replacen('~', &home.to_string_lossy(), 1);
        }
    }
    path.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_tilde_leaves_absolute_paths() {
        assert_eq!(expand_tilde("/var/lib/x"), "/var/lib/x");
    }

    #[test]
    fn test_files_live_under_data_dir() {
        let base = data_dir();
        assert!(feed_db_path().starts_with(&base));
        assert!(config_path().starts_with(&base));
        assert_eq!(wrist_feed_path().file_name().unwrap(), "wrist_feed.json");
    }
}
