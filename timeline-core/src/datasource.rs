//! Ordered, deduplicated post store for one feed.
//!
//! Posts are kept newest first. Every mutation keeps the id set and the
//! ordered sequence in step, so a post id can never appear twice no matter
//! which combination of `set`, `insert`, `insert_contents` and `append` is
//! used.
//!
//! The store itself is not synchronized; `timeline-client` owns it behind
//! the controller's single lock and hands out cloned snapshots.

use std::collections::HashSet;
use timeline_types::{Post, PostId};

/// Content-filter predicate applied to snapshots before they reach the UI.
///
/// The filtering rules themselves live outside this crate.
pub trait PostFilter: Send + Sync {
    /// Whether the post should be shown.
    fn is_visible(&self, post: &Post) -> bool;
}

impl<F> PostFilter for F
where
    F: Fn(&Post) -> bool + Send + Sync,
{
    fn is_visible(&self, post: &Post) -> bool {
        self(post)
    }
}

/// Filter that shows every post.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShowAll;

impl PostFilter for ShowAll {
    fn is_visible(&self, _post: &Post) -> bool {
        true
    }
}

/// Canonical ordered, id-unique post sequence (newest first).
#[derive(Debug, Clone, Default)]
pub struct TimelineDatasource {
    posts: Vec<Post>,
    ids: HashSet<PostId>,
}

impl TimelineDatasource {
    /// Create an empty datasource.
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove every post.
    pub fn reset(&mut self) {
        self.posts.clear();
        self.ids.clear();
    }

    /// Replace all posts. Later duplicates of an id are dropped.
    pub fn set(&mut self, posts: Vec<Post>) {
        self.reset();
        self.append(posts);
    }

    /// Snapshot of all posts.
    pub fn get(&self) -> Vec<Post> {
        self.posts.clone()
    }

    /// Snapshot of the posts the filter lets through.
    pub fn get_filtered(&self, filter: &dyn PostFilter) -> Vec<Post> {
        self.posts
            .iter()
            .filter(|post| filter.is_visible(post))
            .cloned()
            .collect()
    }

    /// Borrow the posts without cloning.
    pub fn as_slice(&self) -> &[Post] {
        &self.posts
    }

    /// Insert one post at `index` (clamped to the length).
    ///
    /// Returns `false` and leaves the store untouched if the id is already present.
    pub fn insert(&mut self, post: Post, index: usize) -> bool {
        if self.ids.contains(&post.id) {
            return false;
        }
        let index = index.min(self.posts.len());
        self.ids.insert(post.id.clone());
        self.posts.insert(index, post);
        true
    }

    /// Insert a batch at `index`, keeping the batch order.
    ///
    /// Ids already present (or repeated within the batch) are dropped from
    /// the incoming batch rather than replacing the stored post. Returns the
    /// ids actually inserted, in batch order.
    pub fn insert_contents(&mut self, posts: Vec<Post>, index: usize) -> Vec<PostId> {
        let fresh = self.take_fresh(posts);
        let inserted: Vec<PostId> = fresh.iter().map(|post| post.id.clone()).collect();
        let index = index.min(self.posts.len());
        self.posts.splice(index..index, fresh);
        inserted
    }

    /// Append a batch of older posts. Same dedup rule as [`insert_contents`](Self::insert_contents).
    ///
    /// Returns how many posts were appended.
    pub fn append(&mut self, posts: Vec<Post>) -> usize {
        let fresh = self.take_fresh(posts);
        let count = fresh.len();
        self.posts.extend(fresh);
        count
    }

    /// Remove the post with the given id.
    pub fn remove(&mut self, id: &PostId) -> Option<Post> {
        let index = self.index_of(id)?;
        self.ids.remove(id);
        Some(self.posts.remove(index))
    }

    /// Trim the tail so at most `safe_offset` posts remain after `anchor`.
    ///
    /// No-op when the anchor is not stored. Returns how many posts were dropped.
    pub fn remove_after(&mut self, anchor: &PostId, safe_offset: usize) -> usize {
        let Some(index) = self.index_of(anchor) else {
            return 0;
        };
        let keep = (index + 1 + safe_offset).min(self.posts.len());
        let dropped: Vec<Post> = self.posts.drain(keep..).collect();
        for post in &dropped {
            self.ids.remove(&post.id);
        }
        dropped.len()
    }

    /// Replace the post at `index` in place, returning the previous post.
    ///
    /// The replacement must carry the same id as the post it replaces;
    /// otherwise nothing changes and `None` is returned.
    pub fn replace(&mut self, post: Post, index: usize) -> Option<Post> {
        let slot = self.posts.get_mut(index)?;
        if slot.id != post.id {
            return None;
        }
        Some(std::mem::replace(slot, post))
    }

    /// Position of the post with the given id.
    pub fn index_of(&self, id: &PostId) -> Option<usize> {
        if !self.ids.contains(id) {
            return None;
        }
        self.posts.iter().position(|post| &post.id == id)
    }

    /// Whether a post with the given id is stored.
    pub fn contains(&self, id: &PostId) -> bool {
        self.ids.contains(id)
    }

    /// Newest post.
    pub fn first(&self) -> Option<&Post> {
        self.posts.first()
    }

    /// Oldest post.
    pub fn last(&self) -> Option<&Post> {
        self.posts.last()
    }

    /// Number of posts.
    pub fn len(&self) -> usize {
        self.posts.len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.posts.is_empty()
    }

    /// Drop posts whose id is already stored or repeated earlier in the batch,
    /// registering the survivors in the id set.
    fn take_fresh(&mut self, posts: Vec<Post>) -> Vec<Post> {
        posts
            .into_iter()
            .filter(|post| self.ids.insert(post.id.clone()))
            .collect()
    }
}
