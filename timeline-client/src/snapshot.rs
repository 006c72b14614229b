//! Immutable views of controller state handed to observers.

use serde::Serialize;
use timeline_core::{FeedPhase, FeedState, PostFilter};
use timeline_types::{FeedKind, Marker, Post, PostId, TimelineError};

/// What one feed looks like at a point in time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeedSnapshot {
    /// Feed kind.
    pub kind: FeedKind,
    /// Posts after filtering, newest first.
    pub posts: Vec<Post>,
    /// Load phase.
    pub phase: FeedPhase,
    /// Initial load or pull-to-refresh in progress.
    pub is_loading: bool,
    /// Pull-to-refresh in progress.
    pub is_refreshing: bool,
    /// Background catch-up in progress ("loading new posts").
    pub is_loading_newest: bool,
    /// Older-page load in progress.
    pub is_loading_older: bool,
    /// Whether an older page may exist.
    pub has_more: bool,
    /// Whether this feed's tab is selected.
    pub is_active: bool,
    /// Oldest loaded id.
    pub max_id: Option<PostId>,
    /// Surfaced error.
    pub error: Option<TimelineError>,
}

impl FeedSnapshot {
    /// Capture `feed`, letting only the posts `filter` accepts through.
    pub fn capture(feed: &FeedState, filter: &dyn PostFilter) -> Self {
        Self {
            kind: feed.kind(),
            posts: feed.posts.get_filtered(filter),
            phase: feed.phase().clone(),
            is_loading: feed.is_loading(),
            is_refreshing: feed.is_refreshing(),
            is_loading_newest: feed.phase().is_polling(),
            is_loading_older: feed.is_loading_older,
            has_more: feed.has_more,
            is_active: feed.is_active,
            max_id: feed.max_id.clone(),
            error: feed.error().cloned(),
        }
    }

    /// Ids of the visible posts, newest first.
    pub fn post_ids(&self) -> Vec<PostId> {
        self.posts.iter().map(|post| post.id.clone()).collect()
    }
}

/// Everything an observer of the controller needs to render.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimelineSnapshot {
    /// Account the state belongs to.
    pub account_id: String,
    /// Selected concrete kind.
    pub active_kind: FeedKind,
    /// The selected feed.
    pub feed: FeedSnapshot,
    /// Unseen posts on the live feed (badge count).
    pub pending_count: usize,
    /// Unseen post ids, newest first.
    pub pending_ids: Vec<PostId>,
    /// Whether live events are applied right now.
    pub can_stream_events: bool,
    /// Marker a resume is currently anchoring on.
    pub resume_marker: Option<Marker>,
}
