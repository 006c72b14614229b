//! Identity and pagination types.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Identifier of a post.
///
/// Servers hand out snowflake-style decimal strings, so two numeric ids are
/// compared by magnitude (shorter is older) and anything else falls back to
/// plain lexicographic order. A larger id is always a newer post.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PostId(String);

impl PostId {
    /// Create a PostId from any string-like value.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw id string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn is_numeric(&self) -> bool {
        !self.0.is_empty() && self.0.bytes().all(|b| b.is_ascii_digit())
    }

    fn digits(&self) -> &str {
        let trimmed = self.0.trim_start_matches('0');
        if trimmed.is_empty() {
            "0"
        } else {
            trimmed
        }
    }
}

impl Ord for PostId {
    fn cmp(&self, other: &Self) -> Ordering {
        if self.is_numeric() && other.is_numeric() {
            let (a, b) = (self.digits(), other.digits());
            a.len()
                .cmp(&b.len())
                .then_with(|| a.cmp(b))
                .then_with(|| self.0.cmp(&other.0))
        } else {
            self.0.cmp(&other.0)
        }
    }
}

impl PartialOrd for PostId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl From<&str> for PostId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for PostId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl fmt::Display for PostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for PostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PostId({})", self.0)
    }
}

/// Pagination bounds for one fetch window.
///
/// `max_id` bounds an older-page fetch, `min_id` bounds a newer-page
/// ("catch-up") fetch. `since_id` is kept for servers that only support
/// the gap-less variant of a newer-page fetch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cursor {
    /// Return results newer than this id, newest first.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub since_id: Option<PostId>,
    /// Return results older than this id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_id: Option<PostId>,
    /// Return results immediately newer than this id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_id: Option<PostId>,
    /// Maximum number of results.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    /// Skip this many results, for feeds paginated by position.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<u32>,
}

impl Cursor {
    /// A cursor for the newest page.
    pub fn first_page() -> Self {
        Self::default()
    }

    /// A cursor for the page older than `max_id`.
    pub fn older_than(max_id: PostId) -> Self {
        Self {
            max_id: Some(max_id),
            ..Self::default()
        }
    }

    /// A cursor for the page immediately newer than `min_id`.
    pub fn newer_than(min_id: PostId) -> Self {
        Self {
            min_id: Some(min_id),
            ..Self::default()
        }
    }

    /// Set the page size.
    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Set the positional offset.
    pub fn with_offset(mut self, offset: u32) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Set the `since_id` bound.
    pub fn with_since(mut self, since_id: PostId) -> Self {
        self.since_id = Some(since_id);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_ids_order_by_magnitude() {
        assert!(PostId::new("99") < PostId::new("100"));
        assert!(PostId::new("109876543210") > PostId::new("9876543210"));
        // Leading zeros never collapse two distinct ids into one.
        assert_ne!(PostId::new("007").cmp(&PostId::new("7")), Ordering::Equal);
    }

    #[test]
    fn non_numeric_ids_order_lexicographically() {
        assert!(PostId::new("abc") < PostId::new("abd"));
        assert!(PostId::new("b") > PostId::new("a9"));
    }

    #[test]
    fn post_id_serializes_as_plain_string() {
        let json = serde_json::to_string(&PostId::new("42")).unwrap();
        assert_eq!(json, "\"42\"");
    }

    #[test]
    fn cursor_builders() {
        let c = Cursor::newer_than(PostId::new("10")).with_limit(40);
        assert_eq!(c.min_id, Some(PostId::new("10")));
        assert_eq!(c.limit, Some(40));
        assert!(c.max_id.is_none());

        let c = Cursor::older_than(PostId::new("5"));
        assert_eq!(c.max_id, Some(PostId::new("5")));
        assert!(c.min_id.is_none());
    }

    #[test]
    fn empty_cursor_omits_all_fields() {
        let json = serde_json::to_string(&Cursor::first_page()).unwrap();
        assert_eq!(json, "{}");
    }
}
