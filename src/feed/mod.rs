//! The wrist feed: per-source reducers, cross-source merge, debounced publish.

pub mod engine;
pub mod entry;
pub mod filters;
pub mod merge;
pub mod reducers;
pub mod scheduler;
pub mod source;
pub mod state;

pub use engine::{FeedEngine, FeedSources};
pub use entry::{EnrichedEntry, RawEntry, Source};
pub use filters::{FilterPolicy, WristFilters};
pub use scheduler::{FeedScheduler, RefreshHandle};
