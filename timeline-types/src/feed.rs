//! Feed kinds.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Which timeline is shown.
///
/// `Latest` and `Resume` are transient aliases: selecting them triggers a
/// side effect and then resolves to the live-eligible concrete kind. They
/// never persist as the active kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedKind {
    /// Posts from followed accounts.
    Following,
    /// Posts from the local instance.
    Local,
    /// Trending posts.
    Trending,
    /// Posts from the whole known network.
    Federated,
    /// Jump to the newest posts, dropping the cached gap.
    Latest,
    /// Continue from the server-persisted read marker.
    Resume,
}

impl FeedKind {
    /// Every concrete (non-alias) kind.
    pub const CONCRETE: [FeedKind; 4] = [
        FeedKind::Following,
        FeedKind::Local,
        FeedKind::Trending,
        FeedKind::Federated,
    ];

    /// Whether this kind is a transient alias.
    pub fn is_alias(self) -> bool {
        matches!(self, FeedKind::Latest | FeedKind::Resume)
    }

    /// Whether the kind can fetch "newer than" pages for incremental catch-up.
    ///
    /// Kinds without it fall back to discard-and-refetch on refresh.
    pub fn supports_newest_pagination(self) -> bool {
        match self {
            FeedKind::Following | FeedKind::Local | FeedKind::Trending | FeedKind::Federated => {
                true
            }
            FeedKind::Latest | FeedKind::Resume => false,
        }
    }

    /// Stable lowercase name.
    pub fn as_str(self) -> &'static str {
        match self {
            FeedKind::Following => "following",
            FeedKind::Local => "local",
            FeedKind::Trending => "trending",
            FeedKind::Federated => "federated",
            FeedKind::Latest => "latest",
            FeedKind::Resume => "resume",
        }
    }
}

impl fmt::Display for FeedKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown feed kind name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown feed kind: {0}")]
pub struct ParseFeedKindError(pub String);

impl FromStr for FeedKind {
    type Err = ParseFeedKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "following" | "home" => Ok(FeedKind::Following),
            "local" => Ok(FeedKind::Local),
            "trending" => Ok(FeedKind::Trending),
            "federated" => Ok(FeedKind::Federated),
            "latest" => Ok(FeedKind::Latest),
            "resume" => Ok(FeedKind::Resume),
            other => Err(ParseFeedKindError(other.to_string())),
        }
    }
}
