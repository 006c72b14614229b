//! # timeline-types
//!
//! Data model types shared by every timeline-sync crate:
//! - [`PostId`], [`Cursor`] - Ordering and pagination types
//! - [`Post`] - The opaque post payload with its identity and revision
//! - [`FeedKind`] - Which timeline is being shown
//! - [`Marker`], [`CacheSnapshot`] - Collaborator payloads (remote read marker, local cache)
//! - [`StreamEvent`] - Live push events
//! - [`TimelineError`] - Error taxonomy

#![warn(missing_docs)]
#![warn(clippy::all)]

mod error;
mod events;
mod feed;
mod ids;
mod marker;
mod post;

pub use error::TimelineError;
pub use events::StreamEvent;
pub use feed::{FeedKind, ParseFeedKindError};
pub use ids::{Cursor, PostId};
pub use marker::{CacheSnapshot, Marker};
pub use post::Post;
