//! Job-level error type.

use engine::{ConfigError, StepSnapshot, WorkflowError};
use steps::StepResults;
use thiserror::Error;

/// `S` is the workflow's shared state, handed back as the unwind left it.
#[derive(Debug, Error)]
pub enum JobError<S> {
    /// The workflow's step list is invalid; it was never started.
    #[error("workflow is misconfigured: {0}")]
    Config(#[from] ConfigError),

    /// The last attempt failed and no further attempt will be made.
    #[error("job failed after {attempts} attempt(s): {error}")]
    Failed {
        attempts: u32,
        #[source]
        error: WorkflowError,
        /// Shared state of the final attempt after compensation.
        shared_state: S,
        /// Outputs of the final attempt's steps that still stand.
        step_results: StepResults,
        /// Snapshots of the final attempt.
        steps: Vec<StepSnapshot>,
    },
}
