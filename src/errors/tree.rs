//! Errors surfaced by the client-side core.

use thiserror::Error;

use super::AppError;
use crate::models::Role;

/// Failure taxonomy of the lock coordinator and its collaborators.
///
/// `LockHeldByOther` and `LockAcquisitionFailed` only ever originate *before* a
/// wrapped mutation runs. Every other variant is passed through from the lock
/// client or the graph store unchanged.
#[derive(Error, Debug)]
pub enum TreeError {
    /// Another user's unexpired lease exists on the tree.
    #[error("Tree is currently being edited by {owner}. Please try again later.")]
    LockHeldByOther { owner: String },

    /// The lease could not be established (lost race, store or network failure).
    #[error("Failed to acquire editor lock: {0}")]
    LockAcquisitionFailed(#[source] Box<TreeError>),

    /// The lease store refused an acquire or release because `owner` holds a live lease.
    #[error("Editor lock is held by {owner}")]
    LockConflict { owner: String },

    /// Member or tree vanished.
    #[error("{0}")]
    NotFound(String),

    /// The graph store's own validation or business-rule rejection, verbatim.
    #[error("{0}")]
    MutationRejected(String),

    /// Credentials missing or refused by a remote service.
    #[error("{0}")]
    Unauthorized(String),

    /// The caller's role does not allow edits.
    #[error("Role '{0}' cannot edit this tree")]
    ReadOnly(Role),

    /// Network failure or an unexpected response.
    #[error("Transport error: {0}")]
    Transport(String),
}

impl TreeError {
    /// Whether this error was raised by the lock layer rather than the mutation.
    pub fn is_lock_error(&self) -> bool {
        matches!(
            self,
            TreeError::LockHeldByOther { .. }
                | TreeError::LockAcquisitionFailed(_)
                | TreeError::LockConflict { .. }
        )
    }

    /// Whether retrying the same call later can succeed without re-navigating.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            TreeError::LockHeldByOther { .. }
                | TreeError::LockAcquisitionFailed(_)
                | TreeError::LockConflict { .. }
                | TreeError::MutationRejected(_)
                | TreeError::Transport(_)
        )
    }
}

impl From<reqwest::Error> for TreeError {
    fn from(err: reqwest::Error) -> Self {
        tracing::error!("HTTP error: {:?}", err);
        TreeError::Transport(err.to_string())
    }
}

impl From<AppError> for TreeError {
    fn from(err: AppError) -> Self {
        match err {
            AppError::LockConflict { lock_owner, .. } => TreeError::LockConflict { owner: lock_owner },
            AppError::Unauthorized(msg) => TreeError::Unauthorized(msg),
            other => TreeError::Transport(other.to_string()),
        }
    }
}
