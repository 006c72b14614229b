//! The post payload as seen by the sync engine.

use serde::{Deserialize, Serialize};

use crate::PostId;

/// A single post.
///
/// The engine only looks at `id` (ordering and dedup key) and `edited_at`
/// (revision for in-place updates). Everything else rides along in
/// `payload` untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    /// Ordering and dedup key.
    pub id: PostId,
    /// Last edit time in milliseconds since the Unix epoch, if ever edited.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edited_at: Option<u64>,
    /// Opaque server payload.
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl Post {
    /// Create a post with an empty payload.
    pub fn new(id: impl Into<PostId>) -> Self {
        Self {
            id: id.into(),
            edited_at: None,
            payload: serde_json::Value::Null,
        }
    }

    /// Attach a payload.
    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }

    /// Mark the post as edited at the given time.
    pub fn edited(mut self, at_millis: u64) -> Self {
        self.edited_at = Some(at_millis);
        self
    }

    /// Whether `other` is the same post at the same revision.
    pub fn same_revision(&self, other: &Post) -> bool {
        self.id == other.id && self.edited_at == other.edited_at
    }
}
