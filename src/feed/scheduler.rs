//! Debounced update scheduler.
//!
//! The first request runs a pass immediately (leading edge) and opens a
//! cooldown window. Requests inside the window are coalesced into at most
//! one trailing pass when the window closes. `force` flags are OR-ed across
//! coalesced requests. A trailing pass opens a fresh window; the scheduler
//! returns to idle once a window closes with nothing queued.
//!
//! The leading pass runs on the caller's thread and the cooldown timer is a
//! short-lived std thread. Every pass runs under `catch_unwind`.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::{Duration, Instant};

use super::engine::FeedEngine;
use super::filters::WristFilters;
use crate::config::FeedConfig;
use crate::social::{SocialGraph, WorldDirectory};
use crate::time_utils;
use crate::FeedResult;

/// Scheduler state. `pending`/`force` only carry meaning while cooling down.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Debounce {
    #[default]
    Idle,
    CoolingDown { pending: bool, force: bool },
}

impl Debounce {
    /// Register a request. Returns true when the caller must run a leading
    /// pass now and start the cooldown timer.
    pub fn request(&mut self, force: bool) -> bool {
        match self {
            Debounce::Idle => {
                *self = Debounce::CoolingDown {
                    pending: false,
                    force: false,
                };
                true
            }
            Debounce::CoolingDown {
                pending,
                force: queued,
            } => {
                *pending = true;
                *queued |= force;
                false
            }
        }
    }

    /// Close the cooldown window. If a request was queued, returns its
    /// force flag and keeps cooling down for the trailing pass; otherwise
    /// goes idle.
    pub fn timer_fired(&mut self) -> Option<bool> {
        match *self {
            Debounce::CoolingDown {
                pending: true,
                force,
            } => {
                *self = Debounce::CoolingDown {
                    pending: false,
                    force: false,
                };
                Some(force)
            }
            _ => {
                *self = Debounce::Idle;
                None
            }
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, Debounce::Idle)
    }
}

struct Inner {
    engine: Mutex<FeedEngine>,
    debounce: Mutex<Debounce>,
    /// Social graph initialised; requests before that are dropped.
    ready: AtomicBool,
    delay: Duration,
    passes: AtomicU64,
    forced_passes: AtomicU64,
    failed_passes: AtomicU64,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

impl Inner {
    fn request_update(self: &Arc<Self>, force: bool) {
        if !self.ready.load(Ordering::Acquire) {
            tracing::trace!(force, "Feed update ignored: social graph not ready");
            return;
        }
        let leading = lock(&self.debounce).request(force);
        if !leading {
            tracing::trace!(force, "Feed update coalesced");
            return;
        }
        self.run_pass(force);
        self.start_timer();
    }

    fn start_timer(self: &Arc<Self>) {
        let inner = Arc::clone(self);
        let spawned = std::thread::Builder::new()
            .name("wristfeed-debounce".into())
            .spawn(move || loop {
                std::thread::sleep(inner.delay);
                let trailing = lock(&inner.debounce).timer_fired();
                match trailing {
                    Some(force) => inner.run_pass(force),
                    None => break,
                }
            });
        if let Err(e) = spawned {
            tracing::error!(error = %e, "Failed to spawn debounce timer");
            // Without a timer the window would never close
            let state = std::mem::take(&mut *lock(&self.debounce));
            if let Debounce::CoolingDown {
                pending: true,
                force,
            } = state
            {
                self.run_pass(force);
            }
        }
    }

    /// One pass, panic- and error-isolated.
    fn run_pass(self: &Arc<Self>, force: bool) {
        let refresh = RefreshHandle {
            inner: Arc::downgrade(self),
        };
        let started = Instant::now();
        let mut engine = lock(&self.engine);
        let result = catch_unwind(AssertUnwindSafe(|| {
            engine.run_pass(force, time_utils::now(), &refresh)
        }));
        drop(engine);
        let duration_ms = started.elapsed().as_millis() as u64;

        self.passes.fetch_add(1, Ordering::Relaxed);
        if force {
            self.forced_passes.fetch_add(1, Ordering::Relaxed);
        }
        match result {
            Ok(Ok(Some(count))) => {
                tracing::debug!(force, count, duration_ms, "Feed pass published")
            }
            Ok(Ok(None)) => tracing::trace!(force, duration_ms, "Feed pass: no changes"),
            Ok(Err(e)) => {
                self.failed_passes.fetch_add(1, Ordering::Relaxed);
                tracing::error!(error = %e, force, duration_ms, "Feed pass failed");
            }
            Err(_) => {
                self.failed_passes.fetch_add(1, Ordering::Relaxed);
                tracing::error!(force, duration_ms, "Feed pass panicked");
            }
        }
    }
}

/// Pass counters, for the CLI and tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassStats {
    pub passes: u64,
    pub forced: u64,
    pub failed: u64,
}

/// Owns the engine and serializes every pass through the debounce window.
#[derive(Clone)]
pub struct FeedScheduler {
    inner: Arc<Inner>,
}

impl FeedScheduler {
    pub fn new(engine: FeedEngine) -> Self {
        let delay = Duration::from_millis(engine.config().debounce_ms);
        Self::with_delay(engine, delay)
    }

    pub fn with_delay(engine: FeedEngine, delay: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                engine: Mutex::new(engine),
                debounce: Mutex::new(Debounce::Idle),
                ready: AtomicBool::new(false),
                delay,
                passes: AtomicU64::new(0),
                forced_passes: AtomicU64::new(0),
                failed_passes: AtomicU64::new(0),
            }),
        }
    }

    /// Gate: until the social graph is loaded, requests are no-ops.
    pub fn set_ready(&self, ready: bool) {
        self.inner.ready.store(ready, Ordering::Release);
        tracing::debug!(ready, "Feed scheduler readiness changed");
    }

    pub fn is_ready(&self) -> bool {
        self.inner.ready.load(Ordering::Acquire)
    }

    /// Ask for a feed update. Runs a pass now if idle, otherwise queues one
    /// trailing pass for the end of the cooldown window.
    pub fn request_update(&self, force: bool) {
        self.inner.request_update(force);
    }

    /// Handle for collaborators (directory fetches) that need to re-trigger
    /// updates without owning the scheduler.
    pub fn refresh_handle(&self) -> RefreshHandle {
        RefreshHandle {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Account switch: clear every bucket and cursor.
    pub fn reset(&self) {
        lock(&self.inner.engine).reset();
        tracing::info!("Feed state reset");
    }

    /// Persist a new filter table and force a republish.
    pub fn save_filters(&self, filters: WristFilters) -> FeedResult<()> {
        lock(&self.inner.engine).set_filters(filters)?;
        self.request_update(true);
        Ok(())
    }

    pub fn set_hide_private(&self, hide: bool) {
        lock(&self.inner.engine).set_hide_private(hide);
        self.request_update(true);
    }

    /// Adopt a config reloaded from disk and force a republish.
    pub fn reload_config(&self, config: FeedConfig) {
        lock(&self.inner.engine).replace_config(config);
        self.request_update(true);
    }

    /// Swap relationship state and force a republish.
    pub fn replace_social(&self, social: Arc<dyn SocialGraph>, directory: Arc<dyn WorldDirectory>) {
        lock(&self.inner.engine).replace_social(social, directory);
        self.request_update(true);
    }

    /// Run `f` against the engine under the pass lock.
    pub fn with_engine<R>(&self, f: impl FnOnce(&mut FeedEngine) -> R) -> R {
        f(&mut lock(&self.inner.engine))
    }

    pub fn is_idle(&self) -> bool {
        lock(&self.inner.debounce).is_idle()
    }

    pub fn stats(&self) -> PassStats {
        PassStats {
            passes: self.inner.passes.load(Ordering::Relaxed),
            forced: self.inner.forced_passes.load(Ordering::Relaxed),
            failed: self.inner.failed_passes.load(Ordering::Relaxed),
        }
    }
}

/// Weak back-reference to a scheduler. Requests on a dropped (or detached)
/// scheduler are ignored.
#[derive(Clone, Default)]
pub struct RefreshHandle {
    inner: Weak<Inner>,
}

impl RefreshHandle {
    /// Not attached to any scheduler.
    pub fn detached() -> Self {
        Self { inner: Weak::new() }
    }

    pub fn request_update(&self, force: bool) {
        if let Some(inner) = self.inner.upgrade() {
            inner.request_update(force);
        }
    }
}

impl std::fmt::Debug for RefreshHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshHandle")
            .field("attached", &(self.inner.strong_count() > 0))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::filters::FilterPolicy;
    use crate::test_helpers::*;

    const SHORT: Duration = Duration::from_millis(150);

    fn wait_until(cond: impl Fn() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !cond() && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(10));
        }
    }

    fn wait_idle(s: &FeedScheduler) {
        wait_until(|| s.is_idle());
    }

    #[test]
    fn test_debounce_leading_then_idle() {
        let mut d = Debounce::Idle;
        assert!(d.request(false));
        assert_eq!(
            d,
            Debounce::CoolingDown {
                pending: false,
                force: false
            }
        );
        assert_eq!(d.timer_fired(), None);
        assert!(d.is_idle());
    }

    #[test]
    fn test_debounce_coalesces_and_ors_force() {
        let mut d = Debounce::Idle;
        assert!(d.request(false));
        assert!(!d.request(false));
        assert!(!d.request(true));
        assert!(!d.request(false));
        assert_eq!(d.timer_fired(), Some(true));
        // Trailing pass holds the window open
        assert!(!d.is_idle());
        assert_eq!(d.timer_fired(), None);
        assert!(d.is_idle());
        // Next request starts a fresh window
        assert!(d.request(false));
        assert!(!d.request(false));
        assert_eq!(d.timer_fired(), Some(false));
    }

    #[test]
    fn test_debounce_request_during_trailing_pass_is_queued() {
        let mut d = Debounce::Idle;
        assert!(d.request(false));
        assert!(!d.request(false));
        assert_eq!(d.timer_fired(), Some(false));
        assert!(!d.request(true));
        assert_eq!(d.timer_fired(), Some(true));
        assert_eq!(d.timer_fired(), None);
    }

    #[test]
    fn test_debounce_leading_force_not_carried() {
        let mut d = Debounce::Idle;
        assert!(d.request(true));
        assert!(!d.request(false));
        assert_eq!(d.timer_fired(), Some(false));
    }

    #[test]
    fn test_not_ready_is_noop() {
        let h = EngineHarness::new(StubSocial::new());
        let s = FeedScheduler::with_delay(h.engine(WristFilters::default()), SHORT);
        s.request_update(true);
        assert_eq!(s.stats().passes, 0);
        assert!(s.is_idle());
    }

    #[test]
    fn test_burst_runs_leading_and_one_trailing_pass() {
        let h = EngineHarness::new(StubSocial::new());
        let s = FeedScheduler::with_delay(h.engine(WristFilters::default()), SHORT);
        s.set_ready(true);

        s.request_update(false);
        assert_eq!(s.stats().passes, 1);
        for _ in 0..5 {
            s.request_update(false);
        }
        s.request_update(true);
        assert_eq!(s.stats().passes, 1);

        wait_until(|| s.stats().passes >= 2);
        wait_idle(&s);
        let stats = s.stats();
        assert_eq!(stats.passes, 2);
        assert_eq!(stats.forced, 1);
    }

    #[test]
    fn test_single_request_no_trailing_pass() {
        let h = EngineHarness::new(StubSocial::new());
        let s = FeedScheduler::with_delay(h.engine(WristFilters::default()), SHORT);
        s.set_ready(true);
        s.request_update(false);
        wait_idle(&s);
        assert_eq!(s.stats().passes, 1);
    }

    #[test]
    fn test_trailing_pass_publishes_rows_added_during_cooldown() {
        let h = EngineHarness::new(StubSocial::new());
        let s = FeedScheduler::with_delay(h.engine(WristFilters::default()), SHORT);
        s.set_ready(true);
        s.request_update(false);
        assert_eq!(h.sink.render_count(), 0);

        h.friend_log
            .append(RawEntryBuilder::new("Friend").at(minutes_ago(1)).build())
            .unwrap();
        s.request_update(false);
        assert_eq!(h.sink.render_count(), 0);

        wait_until(|| h.sink.render_count() >= 1);
        assert_eq!(h.sink.render_count(), 1);
    }

    #[test]
    fn test_failed_pass_keeps_scheduler_alive() {
        let mut h = EngineHarness::new(StubSocial::new());
        h.sources.feed = Arc::new(FailingTable);
        let s = FeedScheduler::with_delay(h.engine(WristFilters::default()), SHORT);
        s.set_ready(true);
        s.request_update(false);
        s.request_update(false);
        wait_until(|| s.stats().passes >= 2);
        wait_idle(&s);
        let stats = s.stats();
        assert_eq!(stats.passes, 2);
        assert_eq!(stats.failed, 2);
        // Window closed: the next request leads again
        s.request_update(false);
        assert_eq!(s.stats().passes, 3);
    }

    #[test]
    fn test_panicking_pass_is_contained() {
        let mut h = EngineHarness::new(StubSocial::new());
        h.sources.game_log = Arc::new(PanickingTable);
        let s = FeedScheduler::with_delay(h.engine(WristFilters::default()), SHORT);
        s.set_ready(true);
        s.request_update(false);
        assert_eq!(s.stats().failed, 1);
        wait_idle(&s);
        // Engine lock not poisoned
        s.reset();
        assert!(s.is_idle());
    }

    #[test]
    fn test_save_filters_forces_republish() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let h = EngineHarness::new(StubSocial::new());
        let engine = h.engine(WristFilters::default()).with_config_path(path.clone());
        let s = FeedScheduler::with_delay(engine, SHORT);
        s.set_ready(true);

        s.save_filters(WristFilters::empty().with("GPS", FilterPolicy::Off))
            .unwrap();
        assert_eq!(s.stats().forced, 1);
        assert_eq!(h.sink.render_count(), 1);
        let saved = crate::config::FeedConfig::load_from(&path);
        assert_eq!(saved.wrist_filters().get("GPS"), Some(FilterPolicy::Off));
    }

    #[test]
    fn test_refresh_handle_reaches_scheduler() {
        let h = EngineHarness::new(StubSocial::new());
        let s = FeedScheduler::with_delay(h.engine(WristFilters::default()), SHORT);
        s.set_ready(true);
        let handle = s.refresh_handle();
        handle.request_update(true);
        assert_eq!(s.stats().passes, 1);
        wait_idle(&s);

        drop(s);
        // Dropped scheduler: no-op
        handle.request_update(true);
        RefreshHandle::detached().request_update(true);
    }

    #[test]
    fn test_cache_miss_publishes_traveler_once_warm() {
        let social = StubSocial::new()
            .friend("usr_t")
            .here("wrld_home:1", &[])
            .traveler(crate::social::Traveler {
                user_id: "usr_t".into(),
                display_name: "Tess".into(),
                location: "wrld_far:7".into(),
                world_id: "wrld_far".into(),
                group_id: None,
                created_at: minutes_ago(1),
            });
        let h = EngineHarness::new(social);
        let directory = Arc::new(WarmingDirectory::new());
        let mut config = FeedConfig::default();
        config.shared_feed_filters.wrist =
            WristFilters::empty().with("OnPlayerJoining", FilterPolicy::Friends);
        let engine = FeedEngine::new(
            h.sources.clone(),
            h.social.clone(),
            directory.clone(),
            h.sink.clone(),
            config,
        );
        let s = FeedScheduler::with_delay(engine, SHORT);
        s.set_ready(true);

        // Miss: published without the traveler, fetch pending
        s.request_update(true);
        assert_eq!(h.sink.last_payload().as_deref(), Some("[]"));
        assert!(directory.is_waiting());
        wait_idle(&s);

        // Cache warms and the stored handle asks for another pass
        directory.warm("wrld_far", "Far Away");
        wait_until(|| h.sink.last_payload().is_some_and(|p| p.contains("Far Away")));
        let payload = h.sink.last_payload().unwrap();
        assert!(payload.contains("Tess"), "{}", payload);
        assert!(payload.contains(r#""isTraveling":true"#), "{}", payload);
        assert!(!directory.is_waiting());
    }
}
