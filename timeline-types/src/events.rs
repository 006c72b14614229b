//! Live push events.

use serde::{Deserialize, Serialize};

use crate::{FeedKind, Post, PostId};

/// A discrete event from the live stream, tagged with the feed it belongs to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum StreamEvent {
    /// A new post.
    Update {
        /// Feed the post was pushed for.
        kind: FeedKind,
        /// The post.
        post: Post,
    },
    /// A post was deleted.
    Delete {
        /// Feed the deletion was pushed for.
        kind: FeedKind,
        /// Id of the deleted post.
        id: PostId,
    },
    /// A post was edited.
    Edit {
        /// Feed the edit was pushed for.
        kind: FeedKind,
        /// The post at its new revision.
        post: Post,
    },
}

impl StreamEvent {
    /// Feed kind this event targets.
    pub fn kind(&self) -> FeedKind {
        match self {
            StreamEvent::Update { kind, .. }
            | StreamEvent::Delete { kind, .. }
            | StreamEvent::Edit { kind, .. } => *kind,
        }
    }

    /// Id of the post this event concerns.
    pub fn post_id(&self) -> &PostId {
        match self {
            StreamEvent::Update { post, .. } | StreamEvent::Edit { post, .. } => &post.id,
            StreamEvent::Delete { id, .. } => id,
        }
    }
}
