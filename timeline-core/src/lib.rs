//! # timeline-core
//!
//! Pure logic for timeline synchronization (no I/O, instant tests).
//!
//! This crate implements the ordered store, the per-feed state machine and
//! the live-event routing rules without any network or disk I/O.
//!
//! ## Design Philosophy
//!
//! All modules in this crate are **pure** - they take input and produce output
//! without side effects. This enables:
//! - Instant unit tests (no mocks, no async)
//! - Deterministic behavior (same input → same output)
//! - Easy reasoning about state transitions
//!
//! The actual I/O (fetching, caching, markers) is performed by
//! `timeline-client`, which interprets the actions produced by these
//! state machines.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod datasource;
pub mod endpoint;
pub mod feed;
pub mod pending;
pub mod phase;
pub mod router;

pub use datasource::{PostFilter, ShowAll, TimelineDatasource};
pub use endpoint::{resolve, EndpointError, FetchDescriptor};
pub use feed::FeedState;
pub use pending::PendingStatusTracker;
pub use phase::{classify_failure, FailureOutcome, FeedPhase, PhaseAction, PhaseEvent};
pub use router::{IgnoreReason, RouteOutcome, StreamEventRouter};
