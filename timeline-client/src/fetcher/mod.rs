//! Status fetching abstraction.
//!
//! The controller never talks to the network directly. Every page it needs
//! goes through a [`StatusFetcher`], which maps a feed kind and a cursor to
//! a request (see [`timeline_core::resolve`]) and decodes the response.
//!
//! # Contract
//!
//! - Results are ordered newest-first.
//! - An empty result means "nothing there" and is not an error.
//! - Only transport, auth and decode failures are returned as errors.
//!
//! # Example
//!
//! ```ignore
//! let fetcher = MockStatusFetcher::new(20);
//! fetcher.set_timeline(FeedKind::Local, posts);
//! let page = fetcher.fetch_first_page(FeedKind::Local).await?;
//! ```

mod mock;

pub use mock::MockStatusFetcher;

use async_trait::async_trait;
use timeline_types::{FeedKind, Post, PostId, TimelineError};

/// Collaborator that loads pages of posts for a concrete feed kind.
#[async_trait]
pub trait StatusFetcher: Send + Sync {
    /// Load the newest page.
    async fn fetch_first_page(&self, kind: FeedKind) -> Result<Vec<Post>, TimelineError>;

    /// Load the page directly older than `last_id`.
    ///
    /// `offset` is the number of posts already loaded, for kinds that page
    /// by position rather than by id.
    async fn fetch_next_page(
        &self,
        kind: FeedKind,
        last_id: &PostId,
        offset: usize,
    ) -> Result<Vec<Post>, TimelineError>;

    /// Load posts newer than `min_id`.
    ///
    /// May issue up to `max_pages` sequential requests and concatenate
    /// them; stops early on a short page.
    async fn fetch_new_pages(
        &self,
        kind: FeedKind,
        min_id: &PostId,
        max_pages: usize,
    ) -> Result<Vec<Post>, TimelineError>;
}
