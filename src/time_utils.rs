use chrono::{DateTime, Duration, Utc};

use crate::constants::FEED_WINDOW_HOURS;

/// Current timestamp in UTC.
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Format an ISO 8601 timestamp for SQLite (millisecond precision, `Z` suffix).
pub fn to_sqlite(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

/// Parse an ISO 8601 timestamp read back from SQLite.
pub fn from_sqlite(s: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    s.parse::<DateTime<Utc>>()
}

/// Oldest instant still inside the trailing feed window ending at `now`.
pub fn window_start(now: DateTime<Utc>) -> DateTime<Utc> {
    now - Duration::hours(FEED_WINDOW_HOURS)
}
