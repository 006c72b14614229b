//! Collaborator payloads: the remote read marker and the local cache snapshot.

use serde::{Deserialize, Serialize};

use crate::{FeedKind, Post, PostId};

/// Server-persisted last-read position for one feed kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Marker {
    /// Feed the marker belongs to.
    pub feed_kind: FeedKind,
    /// Newest post the user has read.
    pub last_read_id: PostId,
    /// Server-side revision counter.
    #[serde(default)]
    pub version: u64,
    /// Last update time in milliseconds since the Unix epoch.
    #[serde(default)]
    pub updated_at: u64,
}

impl Marker {
    /// Create a marker at version 0.
    pub fn new(feed_kind: FeedKind, last_read_id: impl Into<PostId>) -> Self {
        Self {
            feed_kind,
            last_read_id: last_read_id.into(),
            version: 0,
            updated_at: 0,
        }
    }
}

/// A persisted snapshot of one feed for one account.
///
/// The engine reads it once per cold activation; its encoding belongs to
/// the cache implementation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheSnapshot {
    /// Account the snapshot was stored for.
    pub account_id: String,
    /// Feed the snapshot was stored for.
    pub feed_kind: FeedKind,
    /// Posts, newest first.
    pub posts: Vec<Post>,
    /// Store time in milliseconds since the Unix epoch.
    pub stored_at: u64,
}
