//! Live event routing.
//!
//! Push events only touch the single live-eligible feed, only while its tab
//! is active, and only while no catch-up loop is merging into it. The last
//! gate keeps a post that arrives both through the stream and through an
//! in-flight catch-up page from being applied twice.

use timeline_types::{FeedKind, PostId, StreamEvent};

use crate::feed::FeedState;
use crate::pending::PendingStatusTracker;

/// Why an event was not applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// The event (or target feed) is not the live-eligible kind.
    NotLiveKind,
    /// The live kind's tab is not selected.
    Inactive,
    /// A catch-up loop is in flight.
    CatchUpInFlight,
}

/// Result of routing one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteOutcome {
    /// A new post was prepended and marked pending.
    Inserted(PostId),
    /// A post was removed.
    Deleted(PostId),
    /// A post was replaced in place.
    Edited(PostId),
    /// The event was valid but changed nothing (duplicate, unknown id, same revision).
    Unchanged,
    /// The event was gated out.
    Ignored(IgnoreReason),
}

impl RouteOutcome {
    /// Whether the feed changed.
    pub fn is_mutation(&self) -> bool {
        matches!(
            self,
            RouteOutcome::Inserted(_) | RouteOutcome::Deleted(_) | RouteOutcome::Edited(_)
        )
    }
}

/// Applies live push events to the live-eligible feed.
#[derive(Debug, Clone, Copy)]
pub struct StreamEventRouter {
    live_kind: FeedKind,
}

impl StreamEventRouter {
    /// Create a router for the given live-eligible kind.
    pub fn new(live_kind: FeedKind) -> Self {
        Self { live_kind }
    }

    /// The live-eligible kind.
    pub fn live_kind(&self) -> FeedKind {
        self.live_kind
    }

    /// Check the gates without touching anything.
    pub fn gate(
        &self,
        event: &StreamEvent,
        feed: &FeedState,
        can_stream_events: bool,
    ) -> Result<(), IgnoreReason> {
        if event.kind() != self.live_kind || feed.kind() != self.live_kind {
            return Err(IgnoreReason::NotLiveKind);
        }
        if !feed.is_active {
            return Err(IgnoreReason::Inactive);
        }
        if !can_stream_events {
            return Err(IgnoreReason::CatchUpInFlight);
        }
        Ok(())
    }

    /// Apply one event to the live feed and its pending set.
    pub fn route(
        &self,
        event: StreamEvent,
        feed: &mut FeedState,
        pending: &mut PendingStatusTracker,
        can_stream_events: bool,
    ) -> RouteOutcome {
        if let Err(reason) = self.gate(&event, feed, can_stream_events) {
            return RouteOutcome::Ignored(reason);
        }

        match event {
            StreamEvent::Update { post, .. } => {
                let id = post.id.clone();
                if !feed.posts.insert(post, 0) {
                    return RouteOutcome::Unchanged;
                }
                pending.add_newest([id.clone()]);
                RouteOutcome::Inserted(id)
            }
            StreamEvent::Delete { id, .. } => match feed.posts.remove(&id) {
                Some(_) => {
                    pending.forget(&id);
                    feed.mark_hidden(&id);
                    feed.sync_max_id();
                    RouteOutcome::Deleted(id)
                }
                None => RouteOutcome::Unchanged,
            },
            StreamEvent::Edit { post, .. } => {
                let Some(index) = feed.posts.index_of(&post.id) else {
                    return RouteOutcome::Unchanged;
                };
                if feed.posts.as_slice()[index].same_revision(&post) {
                    return RouteOutcome::Unchanged;
                }
                let id = post.id.clone();
                match feed.posts.replace(post, index) {
                    Some(_) => RouteOutcome::Edited(id),
                    None => RouteOutcome::Unchanged,
                }
            }
        }
    }
}
