//! Unread tracking for the live-eligible feed.
//!
//! This module tracks ids that were fetched or pushed but not yet scrolled
//! into view:
//! - Newest first, no duplicates
//! - Seeing a post also clears every older pending post
//! - The count is always derived from the ids, never stored separately
//!
//! Posts arrive above the reading position and the user scrolls up through
//! them oldest to newest, so by the time a pending post appears every older
//! pending post has already been passed.

use std::collections::VecDeque;
use timeline_types::PostId;

/// Ordered set of unseen post ids (newest first).
#[derive(Debug, Clone, Default)]
pub struct PendingStatusTracker {
    pending: VecDeque<PostId>,
}

impl PendingStatusTracker {
    /// Create an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a newest-first batch of new ids above everything pending.
    ///
    /// Ids already pending are skipped. Returns how many were added.
    pub fn add_newest<I>(&mut self, ids: I) -> usize
    where
        I: IntoIterator<Item = PostId>,
    {
        let fresh: Vec<PostId> = ids
            .into_iter()
            .filter(|id| !self.pending.contains(id))
            .collect();
        let added = fresh.len();
        for id in fresh.into_iter().rev() {
            self.pending.push_front(id);
        }
        added
    }

    /// The user saw `seen`: drop it and every older pending id.
    ///
    /// Afterwards only ids strictly newer than `seen` remain. Unknown ids
    /// are a no-op. Returns how many ids were dropped.
    pub fn remove_status(&mut self, seen: &PostId) -> usize {
        match self.pending.iter().position(|id| id == seen) {
            Some(index) => self.pending.drain(index..).count(),
            None => 0,
        }
    }

    /// Forget a single id (for example after a delete event).
    pub fn forget(&mut self, id: &PostId) -> bool {
        match self.pending.iter().position(|pending| pending == id) {
            Some(index) => {
                self.pending.remove(index);
                true
            }
            None => false,
        }
    }

    /// Number of unseen posts. Drives the unread badge.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Whether an id is pending.
    pub fn is_pending(&self, id: &PostId) -> bool {
        self.pending.contains(id)
    }

    /// Pending ids, newest first.
    pub fn pending_ids(&self) -> Vec<PostId> {
        self.pending.iter().cloned().collect()
    }

    /// Clear all pending ids.
    pub fn clear(&mut self) {
        self.pending.clear();
    }
}
