//! Per-kind feed state.
//!
//! One [`FeedState`] exists per concrete feed kind. It survives tab switches
//! and is reset on account switch. The loading flags and the surfaced error
//! are derived from the [`FeedPhase`], so `is_refreshing ⇒ is_loading` and
//! "loading clears the error" hold by construction.

use std::collections::HashSet;
use std::time::{Duration, Instant};
use timeline_types::{FeedKind, PostId, TimelineError};

use crate::datasource::TimelineDatasource;
use crate::phase::{FeedPhase, PhaseAction, PhaseEvent};

/// Mutable state of one feed kind.
#[derive(Debug, Clone)]
pub struct FeedState {
    kind: FeedKind,
    /// Ordered, id-unique posts (newest first).
    pub posts: TimelineDatasource,
    phase: FeedPhase,
    /// Oldest loaded id; the bound for the next older page.
    pub max_id: Option<PostId>,
    /// Whether an older page may exist.
    pub has_more: bool,
    /// Whether this kind's tab is the selected one.
    pub is_active: bool,
    /// When the feed last reached the network head.
    pub last_refresh: Option<Instant>,
    /// Whether an older-page load is in flight.
    pub is_loading_older: bool,
    visible: HashSet<PostId>,
}

impl FeedState {
    /// Create an empty, idle feed.
    pub fn new(kind: FeedKind) -> Self {
        Self {
            kind,
            posts: TimelineDatasource::new(),
            phase: FeedPhase::Idle,
            max_id: None,
            has_more: true,
            is_active: false,
            last_refresh: None,
            is_loading_older: false,
            visible: HashSet::new(),
        }
    }

    /// Kind this state belongs to.
    pub fn kind(&self) -> FeedKind {
        self.kind
    }

    /// Current phase.
    pub fn phase(&self) -> &FeedPhase {
        &self.phase
    }

    /// Feed an event to the phase machine and return the actions to run.
    pub fn apply(&mut self, event: PhaseEvent) -> Vec<PhaseAction> {
        let phase = std::mem::take(&mut self.phase);
        let (next, actions) = phase.on_event(event);
        self.phase = next;
        actions
    }

    /// Build the activation event for the current contents.
    pub fn activation_event(&self, now: Instant, ttl: Duration) -> PhaseEvent {
        PhaseEvent::Activated {
            has_posts: !self.posts.is_empty(),
            fresh: self.is_fresh(now, ttl),
            supports_newest: self.kind.supports_newest_pagination(),
        }
    }

    /// Build the pull-to-refresh event for the current contents.
    pub fn refresh_event(&self) -> PhaseEvent {
        PhaseEvent::RefreshRequested {
            has_posts: !self.posts.is_empty(),
            supports_newest: self.kind.supports_newest_pagination(),
        }
    }

    /// Build the interruption event for the current contents.
    pub fn interrupt_event(&self) -> PhaseEvent {
        PhaseEvent::Interrupted {
            has_posts: !self.posts.is_empty(),
        }
    }

    /// Build the failure event for the current contents.
    pub fn failure_event(&self, error: TimelineError) -> PhaseEvent {
        PhaseEvent::FetchFailed {
            error,
            has_posts: !self.posts.is_empty(),
        }
    }

    /// Initial load or pull-to-refresh in progress.
    pub fn is_loading(&self) -> bool {
        self.phase.is_loading()
    }

    /// Pull-to-refresh in progress.
    pub fn is_refreshing(&self) -> bool {
        self.phase.is_refreshing()
    }

    /// Surfaced error.
    pub fn error(&self) -> Option<&TimelineError> {
        self.phase.error()
    }

    /// Whether the last refresh is younger than `ttl`.
    pub fn is_fresh(&self, now: Instant, ttl: Duration) -> bool {
        self.last_refresh
            .is_some_and(|at| now.saturating_duration_since(at) < ttl)
    }

    /// Update the older-page cursor after the tail changed.
    ///
    /// `page_len` is the size of the page just received (if any) and decides
    /// `has_more` against the full `page_size`.
    pub fn update_paging(&mut self, page_len: Option<usize>, page_size: usize) {
        self.sync_max_id();
        if let Some(len) = page_len {
            self.has_more = len >= page_size;
        }
    }

    /// Point the older-page cursor at the current tail.
    pub fn sync_max_id(&mut self) {
        self.max_id = self.posts.last().map(|post| post.id.clone());
    }

    /// Drop every post, the paging cursor and visibility.
    pub fn discard(&mut self) {
        self.posts.reset();
        self.max_id = None;
        self.has_more = true;
        self.last_refresh = None;
        self.visible.clear();
    }

    /// Back to a freshly created feed, keeping `is_active`.
    pub fn reset(&mut self) {
        self.discard();
        self.apply(PhaseEvent::Reset);
        self.is_loading_older = false;
    }

    /// A post scrolled into view.
    pub fn mark_visible(&mut self, id: PostId) {
        self.visible.insert(id);
    }

    /// A post scrolled out of view.
    pub fn mark_hidden(&mut self, id: &PostId) {
        self.visible.remove(id);
    }

    /// The lowest visible post on screen (trim anchor).
    pub fn last_visible(&self) -> Option<PostId> {
        self.posts
            .as_slice()
            .iter()
            .rev()
            .find(|post| self.visible.contains(&post.id))
            .map(|post| post.id.clone())
    }

    /// The highest visible post on screen (read marker position).
    pub fn top_visible(&self) -> Option<PostId> {
        self.posts
            .as_slice()
            .iter()
            .find(|post| self.visible.contains(&post.id))
            .map(|post| post.id.clone())
    }
}
