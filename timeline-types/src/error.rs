//! Error taxonomy for timeline synchronization.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors a fetch can end with.
///
/// `Clone` and `PartialEq` so the error can be kept in feed state and
/// compared in tests.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "type", content = "message", rename_all = "lowercase")]
pub enum TimelineError {
    /// Network failure or timeout.
    #[error("transport error: {0}")]
    Transport(String),

    /// The session is no longer authorized.
    #[error("unauthorized: {0}")]
    Auth(String),

    /// The server returned a payload that could not be decoded.
    #[error("decode error: {0}")]
    Decode(String),

    /// The task was cancelled or superseded. Never shown to the user.
    #[error("cancelled")]
    Cancelled,
}

impl TimelineError {
    /// Whether this is an authorization failure.
    pub fn is_auth(&self) -> bool {
        matches!(self, TimelineError::Auth(_))
    }

    /// Whether this is a cancellation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, TimelineError::Cancelled)
    }
}
