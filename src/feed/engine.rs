//! One reduction + merge + publish cycle over all five sources.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use super::entry::{EnrichedEntry, Source};
use super::filters::WristFilters;
use super::merge;
use super::reducers::{self, ReduceContext};
use super::scheduler::RefreshHandle;
use super::source::{ModerationLookup, SourceTable};
use super::state::FeedState;
use crate::config::FeedConfig;
use crate::sink::{NotificationQueue, RenderSink};
use crate::social::{SocialGraph, WorldDirectory};
use crate::FeedResult;

/// The five event tables plus the player moderation list.
#[derive(Clone)]
pub struct FeedSources {
    pub game_log: Arc<dyn SourceTable>,
    pub feed: Arc<dyn SourceTable>,
    pub notifications: Arc<dyn SourceTable>,
    pub friend_log: Arc<dyn SourceTable>,
    pub moderation_against: Arc<dyn SourceTable>,
    pub player_moderations: Arc<dyn ModerationLookup>,
}

impl FeedSources {
    pub fn table(&self, source: Source) -> &dyn SourceTable {
        match source {
            Source::GameLog => self.game_log.as_ref(),
            Source::Feed => self.feed.as_ref(),
            Source::Notifications => self.notifications.as_ref(),
            Source::FriendLog => self.friend_log.as_ref(),
            Source::ModerationAgainst => self.moderation_against.as_ref(),
        }
    }
}

pub struct FeedEngine {
    sources: FeedSources,
    social: Arc<dyn SocialGraph>,
    directory: Arc<dyn WorldDirectory>,
    sink: Arc<dyn RenderSink>,
    noty: Option<Arc<dyn NotificationQueue>>,
    config: FeedConfig,
    config_path: Option<PathBuf>,
    state: FeedState,
    last_published: Vec<EnrichedEntry>,
}

impl FeedEngine {
    pub fn new(
        sources: FeedSources,
        social: Arc<dyn SocialGraph>,
        directory: Arc<dyn WorldDirectory>,
        sink: Arc<dyn RenderSink>,
        config: FeedConfig,
    ) -> Self {
        Self {
            sources,
            social,
            directory,
            sink,
            noty: None,
            config,
            config_path: None,
            state: FeedState::new(),
            last_published: Vec::new(),
        }
    }

    pub fn with_notifications(mut self, noty: Arc<dyn NotificationQueue>) -> Self {
        self.noty = Some(noty);
        self
    }

    /// Persist filter changes to this file.
    pub fn with_config_path(mut self, path: PathBuf) -> Self {
        self.config_path = Some(path);
        self
    }

    pub fn state(&self) -> &FeedState {
        &self.state
    }

    pub fn config(&self) -> &FeedConfig {
        &self.config
    }

    /// What the sink received last.
    pub fn last_published(&self) -> &[EnrichedEntry] {
        &self.last_published
    }

    /// Swap the wrist filter table, saving it when a config path is set.
    pub fn set_filters(&mut self, filters: WristFilters) -> FeedResult<()> {
        self.config.shared_feed_filters.wrist = filters;
        if let Some(path) = &self.config_path {
            self.config.save_to(path)?;
        }
        Ok(())
    }

    pub fn set_hide_private(&mut self, hide: bool) {
        self.config.hide_private_from_feed = hide;
    }

    /// Adopt settings changed on disk by another process.
    pub fn replace_config(&mut self, config: FeedConfig) {
        self.config = config;
    }

    /// Swap the relationship state, e.g. after a fresh snapshot export.
    pub fn replace_social(&mut self, social: Arc<dyn SocialGraph>, directory: Arc<dyn WorldDirectory>) {
        self.social = social;
        self.directory = directory;
    }

    /// Account switch.
    pub fn reset(&mut self) {
        self.state.reset();
        self.last_published.clear();
    }

    /// Run every reducer in source order, then merge and publish if any
    /// bucket changed (or the pass was forced).
    ///
    /// Returns the number of published entries, or `None` when nothing was
    /// published. A reducer error aborts the pass before anything reaches
    /// the sink.
    pub fn run_pass(
        &mut self,
        force: bool,
        now: DateTime<Utc>,
        refresh: &RefreshHandle,
    ) -> FeedResult<Option<usize>> {
        let ctx = ReduceContext {
            now,
            force,
            filters: self.config.wrist_filters(),
            hide_private: self.config.hide_private_from_feed,
            social: self.social.as_ref(),
            current_user: self.social.current_user(),
            noty: self.noty.as_deref(),
        };

        for source in Source::ALL {
            reducers::reduce_source(
                &mut self.state,
                source,
                self.sources.table(source),
                self.sources.player_moderations.as_ref(),
                &ctx,
            )?;
        }

        // Forced passes republish so filter changes and warm caches show up
        if force {
            self.state.pending_render = true;
        }
        if !self.state.pending_render {
            return Ok(None);
        }

        let mut items = self.state.all_items();
        items.extend(merge::traveler_entries(
            self.social.as_ref(),
            self.directory.as_ref(),
            self.config.wrist_filters(),
            refresh,
        ));
        let items = merge::sort_and_cap(items);
        let payload = merge::serialize(&items)?;

        self.sink.render_wrist_feed(&payload);
        self.sink.apply_user_dialog_instances();
        self.sink.apply_world_dialog_instances();
        self.sink.apply_group_dialog_instances();

        self.state.pending_render = false;
        let count = items.len();
        self.last_published = items;
        tracing::debug!(count, force, "Wrist feed published");
        Ok(Some(count))
    }
}
