//! # timeline-client
//!
//! Async timeline synchronization for a social client.
//!
//! This is the library an app embeds to keep its timelines in sync with the
//! server. It drives the pure state machines from `timeline-core` and talks
//! to the outside world through three collaborators.
//!
//! ## Features
//!
//! - **Per-kind feeds**: Following, Local, Trending and Federated keep their
//!   own posts across tab switches
//! - **Catch-up**: bounded "fetch newer than head" loop after every first
//!   load, refresh and poll
//! - **Live events**: push updates for the live kind, gated while a catch-up
//!   is merging
//! - **Resume**: continue from the server-side read marker
//! - **Pluggable collaborators**: [`StatusFetcher`], [`CacheStore`] and
//!   [`MarkerService`], with in-memory implementations for tests
//!
//! ## Example
//!
//! ```ignore
//! use timeline_client::{MockStatusFetcher, TimelineConfig, TimelineSyncController};
//!
//! let controller = TimelineSyncController::new(TimelineConfig::default(), fetcher);
//! controller.select_kind(FeedKind::Local).await.wait().await;
//!
//! let mut updates = controller.subscribe();
//! while updates.changed().await.is_ok() {
//!     render(&updates.borrow_and_update());
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod background;
pub mod cache;
pub mod config;
pub mod controller;
pub mod error;
pub mod fetcher;
pub mod gate;
pub mod marker;
pub mod snapshot;

pub use background::{spawn_poller, spawn_stream_listener};
pub use cache::{CacheStore, InMemoryCache};
pub use config::{ConfigError, TimelineConfig};
pub use controller::{ControllerBuilder, SyncTask, TimelineSyncController, DEFAULT_ACCOUNT};
pub use error::CollaboratorError;
pub use fetcher::{MockStatusFetcher, StatusFetcher};
pub use gate::Gate;
pub use marker::{InMemoryMarkers, MarkerService};
pub use snapshot::{FeedSnapshot, TimelineSnapshot};
