//! Step-level error type.

use thiserror::Error;

/// Errors returned by a step's `execute` or `compensate` method.
///
/// The engine never retries a step.  The variant only tells the job host
/// whether re-running the whole workflow might succeed:
/// - `Retryable` — transient; the host may schedule another attempt.
/// - `Fatal`     — permanent; further attempts are pointless.
#[derive(Debug, Error)]
pub enum StepError {
    /// Transient failure; a later workflow attempt may succeed.
    #[error("retryable step error: {0}")]
    Retryable(String),

    /// Permanent failure.
    #[error("fatal step error: {0}")]
    Fatal(String),

    /// Any other error bubbled up from step code with `?`.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl StepError {
    /// Whether the job host should try the workflow again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Retryable(_))
    }
}
