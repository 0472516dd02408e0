//! What an execution hands back to its caller.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use steps::StepResults;
use uuid::Uuid;

use crate::error::WorkflowError;
use crate::models::{StepSnapshot, StepStatus};

/// A workflow whose every step completed.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowSuccess<S> {
    pub workflow_id: Uuid,
    pub completed_at: DateTime<Utc>,
    pub duration_ms: u64,
    /// Value computed by the workflow's completion hook.
    pub result: Value,
    pub shared_state: S,
    pub step_results: StepResults,
    pub steps: Vec<StepSnapshot>,
}

/// A workflow that stopped on an error.
///
/// `steps` shows how far the unwind got: compensated steps are
/// `compensated`, a step whose compensation failed is `failed`, and steps
/// the unwind never reached are still `completed`.
#[derive(Debug)]
pub struct WorkflowFailure<S> {
    pub workflow_id: Uuid,
    pub failed_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub error: WorkflowError,
    pub shared_state: S,
    pub step_results: StepResults,
    pub steps: Vec<StepSnapshot>,
}

impl<S> WorkflowFailure<S> {
    /// True when at least one completed step was never compensated.
    pub fn is_partially_unwound(&self) -> bool {
        self.steps.iter().any(|s| s.status == StepStatus::Completed)
    }
}

/// Exactly one of these is produced per execution that got past validation.
#[derive(Debug)]
pub enum WorkflowResult<S> {
    Success(WorkflowSuccess<S>),
    Failure(WorkflowFailure<S>),
}

impl<S> WorkflowResult<S> {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    pub fn status(&self) -> &'static str {
        match self {
            Self::Success(_) => "success",
            Self::Failure(_) => "failure",
        }
    }

    pub fn workflow_id(&self) -> Uuid {
        match self {
            Self::Success(s) => s.workflow_id,
            Self::Failure(f) => f.workflow_id,
        }
    }

    pub fn steps(&self) -> &[StepSnapshot] {
        match self {
            Self::Success(s) => &s.steps,
            Self::Failure(f) => &f.steps,
        }
    }

    pub fn shared_state(&self) -> &S {
        match self {
            Self::Success(s) => &s.shared_state,
            Self::Failure(f) => &f.shared_state,
        }
    }

    /// Collapse into the success value or the terminating error.
    pub fn into_result(self) -> Result<WorkflowSuccess<S>, WorkflowError> {
        match self {
            Self::Success(s) => Ok(s),
            Self::Failure(f) => Err(f.error),
        }
    }
}
