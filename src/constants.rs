// === Scheduler ===
pub const DEBOUNCE_MS: u64 = 150;

// === Reduction window ===
pub const FEED_WINDOW_HOURS: i64 = 24;

// === Per-source caps (during scan) ===
pub const GAME_LOG_CAP: usize = 50;
pub const FEED_CAP: usize = 20;
pub const NOTIFICATION_CAP: usize = 20;
pub const FRIEND_LOG_CAP: usize = 20;
pub const MODERATION_CAP: usize = 20;

// === Wrist display ===
pub const WRIST_FEED_CAP: usize = 16;

// === Travel noise cancellation ===
pub const LEAVE_CANCEL_SECS: i64 = 5;  // OnPlayerLeft burst around LocationDestination
pub const JOIN_CANCEL_SECS: i64 = 20;  // OnPlayerJoined burst after Location

// === SQLite Tuning ===
pub const SQLITE_BUSY_TIMEOUT_MS: u32 = 5_000;
pub const WATCH_WAL_AUTOCHECKPOINT: u32 = 1000;
pub const CLI_WAL_AUTOCHECKPOINT: u32 = 0;

// === Watch loop ===
pub const WATCH_INTERVAL_SECS: u64 = 2;
pub const PRUNE_INTERVAL_SECS: u64 = 3600;

// === Retention ===
pub const EVENT_RETENTION_DAYS: u32 = 7;
