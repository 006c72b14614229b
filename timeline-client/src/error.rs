//! Errors from best-effort collaborators.

use thiserror::Error;

/// Failure of a cache or marker collaborator.
///
/// These are logged and swallowed by the controller, never surfaced as a
/// feed error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CollaboratorError {
    /// Backing store or service could not be reached.
    #[error("collaborator unavailable: {0}")]
    Unavailable(String),

    /// The request was refused.
    #[error("collaborator rejected request: {0}")]
    Rejected(String),
}
