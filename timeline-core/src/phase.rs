//! Per-feed sync state machine.
//!
//! This module provides a pure, side-effect-free state machine for one feed's
//! load lifecycle. The state machine takes events as input and produces a new
//! phase plus a list of actions to execute.
//!
//! The actual I/O (fetching pages, reading the cache) is performed by
//! timeline-client, not by this module.
//!
//! ```text
//! Idle ──activate──► Loading ──first page──► Polling ──caught up──► Ready
//!                       ▲                       ▲  │                  │
//!                       │                       │  └──────────────────┤
//!                       │                       └───────poll──────────┤
//!                       │                     Refreshing ◄──refresh───┘
//!  Failed ◄──hard failure (any phase)
//!  Failed ──retry/activate──► Loading
//!  Resume / Latest ──► Loading
//! ```

use serde::Serialize;
use timeline_types::TimelineError;

/// Load phase of one feed - NO I/O, just state transitions.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(tag = "phase", content = "error", rename_all = "lowercase")]
pub enum FeedPhase {
    /// Never activated, or reset.
    #[default]
    Idle,
    /// Initial load in progress.
    Loading,
    /// Showing posts, nothing in flight.
    Ready,
    /// Pull-to-refresh catch-up in progress.
    Refreshing,
    /// Background catch-up towards the live head in progress.
    Polling,
    /// Hard failure; shown as an error view with a retry action.
    Failed(TimelineError),
}

impl FeedPhase {
    /// Process an event and return the new phase plus actions to execute.
    ///
    /// This is a pure function - no side effects. The caller (timeline-client)
    /// is responsible for executing the returned actions.
    pub fn on_event(self, event: PhaseEvent) -> (Self, Vec<PhaseAction>) {
        match (self, event) {
            (_, PhaseEvent::Reset) => (Self::Idle, vec![]),

            // Activation (tab select, tab reselect, retry)
            (_, PhaseEvent::Activated { has_posts: false, .. }) => (
                Self::Loading,
                vec![PhaseAction::FirstLoad { use_cache: true }],
            ),
            (
                Self::Ready | Self::Idle,
                PhaseEvent::Activated {
                    has_posts: true,
                    fresh: true,
                    ..
                },
            ) => (Self::Ready, vec![]),
            (
                _,
                PhaseEvent::Activated {
                    has_posts: true,
                    supports_newest: true,
                    ..
                },
            ) => (
                Self::Polling,
                vec![PhaseAction::CatchUp {
                    pull_to_refresh: false,
                }],
            ),
            (_, PhaseEvent::Activated { has_posts: true, .. }) => (
                Self::Loading,
                vec![
                    PhaseAction::Discard,
                    PhaseAction::FirstLoad { use_cache: false },
                ],
            ),

            // Pull-to-refresh
            (
                _,
                PhaseEvent::RefreshRequested {
                    has_posts: true,
                    supports_newest: true,
                },
            ) => (
                Self::Refreshing,
                vec![PhaseAction::CatchUp {
                    pull_to_refresh: true,
                }],
            ),
            (_, PhaseEvent::RefreshRequested { .. }) => (
                Self::Loading,
                vec![
                    PhaseAction::Discard,
                    PhaseAction::FirstLoad { use_cache: false },
                ],
            ),

            // Aliases
            (_, PhaseEvent::ResumeRequested) => (Self::Loading, vec![PhaseAction::Resume]),
            (_, PhaseEvent::JumpToLatest) => (
                Self::Loading,
                vec![
                    PhaseAction::Discard,
                    PhaseAction::FirstLoad { use_cache: false },
                ],
            ),

            // Scheduled poll only starts from a quiet feed
            (Self::Ready, PhaseEvent::PollRequested) => (
                Self::Polling,
                vec![PhaseAction::CatchUp {
                    pull_to_refresh: false,
                }],
            ),

            // First page arrived: chain into catch-up when the kind supports it
            (
                Self::Loading,
                PhaseEvent::FirstPageLoaded {
                    supports_newest: true,
                },
            ) => (
                Self::Polling,
                vec![PhaseAction::CatchUp {
                    pull_to_refresh: false,
                }],
            ),
            (
                Self::Loading,
                PhaseEvent::FirstPageLoaded {
                    supports_newest: false,
                },
            ) => (Self::Ready, vec![]),

            (Self::Loading | Self::Refreshing | Self::Polling, PhaseEvent::CatchUpFinished) => {
                (Self::Ready, vec![])
            }

            // In-flight work was cancelled: settle on what is stored
            (
                Self::Loading | Self::Refreshing | Self::Polling,
                PhaseEvent::Interrupted { has_posts: true },
            ) => (Self::Ready, vec![]),
            (
                Self::Loading | Self::Refreshing | Self::Polling,
                PhaseEvent::Interrupted { has_posts: false },
            ) => (Self::Idle, vec![]),

            (state, PhaseEvent::FetchFailed { error, has_posts }) => {
                match classify_failure(&error, has_posts) {
                    // A cancelled fetch settles like an interruption, silently
                    FailureOutcome::Swallow => state.on_event(PhaseEvent::Interrupted { has_posts }),
                    FailureOutcome::Surface => (
                        Self::Failed(error.clone()),
                        vec![PhaseAction::Surface(error)],
                    ),
                    FailureOutcome::KeepStale => (Self::Ready, vec![PhaseAction::LogStale(error)]),
                }
            }

            // Invalid transitions - stay in current phase
            (state, _) => (state, vec![]),
        }
    }

    /// Initial load or pull-to-refresh in progress.
    pub fn is_loading(&self) -> bool {
        matches!(self, Self::Loading | Self::Refreshing)
    }

    /// Pull-to-refresh in progress.
    pub fn is_refreshing(&self) -> bool {
        matches!(self, Self::Refreshing)
    }

    /// Background catch-up in progress ("loading new posts" indicator).
    pub fn is_polling(&self) -> bool {
        matches!(self, Self::Polling)
    }

    /// Surfaced error, if any.
    pub fn error(&self) -> Option<&TimelineError> {
        match self {
            Self::Failed(error) => Some(error),
            _ => None,
        }
    }
}

/// Events that drive a feed's phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PhaseEvent {
    /// The kind was selected (or reselected, or retried).
    Activated {
        /// Whether the feed already holds posts.
        has_posts: bool,
        /// Whether the last refresh is recent enough to skip fetching.
        fresh: bool,
        /// Whether the kind supports incremental catch-up.
        supports_newest: bool,
    },
    /// The user pulled to refresh.
    RefreshRequested {
        /// Whether the feed already holds posts.
        has_posts: bool,
        /// Whether the kind supports incremental catch-up.
        supports_newest: bool,
    },
    /// A scheduled poll fired.
    PollRequested,
    /// Continue from the remote read marker.
    ResumeRequested,
    /// Drop everything and load the newest page.
    JumpToLatest,
    /// The first page (or resume anchor) was applied.
    FirstPageLoaded {
        /// Whether the kind supports incremental catch-up.
        supports_newest: bool,
    },
    /// The catch-up loop ended without a hard failure.
    CatchUpFinished,
    /// A fetch failed.
    FetchFailed {
        /// The failure.
        error: TimelineError,
        /// Whether the feed held posts when the failure arrived.
        has_posts: bool,
    },
    /// The task driving the current phase was cancelled.
    Interrupted {
        /// Whether the feed holds posts.
        has_posts: bool,
    },
    /// Account switch or explicit discard.
    Reset,
}

/// Actions to be executed by timeline-client.
///
/// These are instructions, not side effects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PhaseAction {
    /// Fetch the first page, painting from cache meanwhile when allowed.
    FirstLoad {
        /// Whether a cached snapshot may be shown while the fetch runs.
        use_cache: bool,
    },
    /// Fetch the read marker and load the page anchored on it.
    Resume,
    /// Run the bounded catch-up loop towards the live head.
    CatchUp {
        /// Suppress the "loading new posts" indicator.
        pull_to_refresh: bool,
    },
    /// Drop every stored post before the next action.
    Discard,
    /// Show the error view.
    Surface(TimelineError),
    /// Log the failure and keep showing the last good posts.
    LogStale(TimelineError),
}

/// What to do with a failed fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureOutcome {
    /// Cancellation: nothing to show, nothing to log.
    Swallow,
    /// Show the error view.
    Surface,
    /// Stale but available: keep the current posts.
    KeepStale,
}

/// Failure policy.
///
/// Auth failures always surface because the session is unusable. Transport
/// and decode failures only surface when there is nothing to show.
pub fn classify_failure(error: &TimelineError, has_posts: bool) -> FailureOutcome {
    match error {
        TimelineError::Cancelled => FailureOutcome::Swallow,
        TimelineError::Auth(_) => FailureOutcome::Surface,
        TimelineError::Transport(_) | TimelineError::Decode(_) if has_posts => {
            FailureOutcome::KeepStale
        }
        TimelineError::Transport(_) | TimelineError::Decode(_) => FailureOutcome::Surface,
    }
}
