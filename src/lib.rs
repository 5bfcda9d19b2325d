//! Wristfeed: shared activity feed aggregator for a wrist overlay.
//!
//! Five append-only event tables (game log, friend feed, notifications,
//! friend log, moderation-against) are reduced into bounded, filtered,
//! enriched buckets, merged with live travelers, capped and published to a
//! render sink behind a leading+trailing debounce.

// Foundation
pub mod constants;
pub mod error;
pub mod time_utils;
pub mod tracing_init;

// Core
pub mod config;
pub mod feed;
pub mod sink;
pub mod social;

// Persistence
pub mod storage;

#[cfg(test)]
pub mod test_helpers;

// Re-exports for convenience
pub use error::{FeedError, FeedResult};
