//! Engine-level error types.

use steps::StepError;
use thiserror::Error;

use crate::events::EventKind;

/// Problems with a workflow's step list, found before anything runs.
///
/// `Clone` so the outcome of validating a workflow can be cached and handed
/// out on every execution.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// Two or more steps share the same id.
    #[error("duplicate step id: '{0}'")]
    DuplicateStepId(String),

    /// A `depends_on` entry does not name a step declared earlier.
    #[error("step '{step_id}' depends on '{dependency}', which is not declared before it")]
    UnknownDependency { step_id: String, dependency: String },
}

/// Errors produced by a workflow execution.
#[derive(Debug, Error)]
pub enum WorkflowError {
    // ------ Validation errors ------
    #[error(transparent)]
    Config(#[from] ConfigError),

    // ------ Execution errors ------

    /// A step started before one of its dependencies completed.
    #[error("step '{step_id}' requires '{dependency}' to have completed")]
    DependencyViolation { step_id: String, dependency: String },

    /// A step's execute action failed.
    #[error("step '{step_id}' failed: {source}")]
    StepFailed {
        step_id: String,
        #[source]
        source: StepError,
    },

    /// A compensation action failed; the unwind stopped there.
    #[error("compensating step '{step_id}' after '{failed_step_id}' failed: {source}")]
    CompensationFailed {
        step_id: String,
        failed_step_id: String,
        #[source]
        source: StepError,
    },

    /// An observer returned an error while handling an event.
    #[error("observer failed on {event}: {source}")]
    Observer {
        event: EventKind,
        #[source]
        source: anyhow::Error,
    },
}

impl WorkflowError {
    /// Whether re-running the whole workflow might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::StepFailed { source, .. } if source.is_retryable())
    }

    /// Id of the step the error is attributed to, if any.
    pub fn step_id(&self) -> Option<&str> {
        match self {
            Self::DependencyViolation { step_id, .. }
            | Self::StepFailed { step_id, .. }
            | Self::CompensationFailed { step_id, .. } => Some(step_id),
            Self::Config(ConfigError::DuplicateStepId(step_id))
            | Self::Config(ConfigError::UnknownDependency { step_id, .. }) => Some(step_id),
            Self::Observer { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_only_for_retryable_step_failures() {
        let retryable = WorkflowError::StepFailed {
            step_id: "charge".into(),
            source: StepError::Retryable("gateway timeout".into()),
        };
        let fatal = WorkflowError::StepFailed {
            step_id: "charge".into(),
            source: StepError::Fatal("card declined".into()),
        };
        let compensation = WorkflowError::CompensationFailed {
            step_id: "reserve".into(),
            failed_step_id: "charge".into(),
            source: StepError::Retryable("lock busy".into()),
        };

        assert!(retryable.is_retryable());
        assert!(!fatal.is_retryable());
        assert!(!compensation.is_retryable());
    }

    #[test]
    fn display_includes_step_and_cause() {
        let err = WorkflowError::StepFailed {
            step_id: "charge".into(),
            source: StepError::Fatal("card declined".into()),
        };
        assert_eq!(err.to_string(), "step 'charge' failed: fatal step error: card declined");
        assert_eq!(err.step_id(), Some("charge"));
    }
}
