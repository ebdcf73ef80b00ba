//! The crate-wide error taxonomy.
//!
//! Every failure that can reach a caller — synchronously from a submission
//! call, or later through a [`crate::handle::Consumer`] — is a variant of
//! [`PoolError`].

use thiserror::Error;

/// Errors surfaced across the submission and completion-handle surface.
#[derive(Debug, Error)]
pub enum PoolError {
    /// The user callable panicked, or returned an `Err`, while executing.
    /// The original failure's rendered message is preserved.
    #[error("task failed: {0}")]
    TaskFailure(String),

    /// The pool was aborted or reset before this task ran to completion.
    #[error("task was cancelled")]
    Cancelled,

    /// Submission was attempted against a terminated pool.
    #[error("submission rejected: pool is terminated")]
    SubmissionRejected,

    /// [`crate::handle::Consumer::take`] was called a second time on the
    /// same handle. Programmer error.
    #[error("handle was already taken")]
    HandleDoubleTake,

    /// Envelope storage could not be constructed.
    #[error("failed to allocate task envelope: {0}")]
    AllocationFailure(String),
}

/// Convenience alias for results that complete a [`crate::handle::Consumer`].
pub type PoolResult<T> = Result<T, PoolError>;
