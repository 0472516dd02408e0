//! The step traits — the contract every saga step must fulfil.

use std::collections::HashMap;
use std::error::Error;

use async_trait::async_trait;
use serde_json::Value;

use crate::{JobContext, StepError};

/// Outputs of the steps completed so far, keyed by step id.
pub type StepResults = HashMap<String, Value>;

/// Everything a step sees while executing.
pub struct StepArgs<'a, P, S> {
    /// The validated job payload.
    pub payload: &'a P,
    /// Caller-defined state threaded through every step of one execution.
    pub shared_state: &'a mut S,
    pub job: &'a JobContext,
    pub step_results: &'a StepResults,
}

/// Everything a step sees while being compensated.
pub struct CompensationArgs<'a, P, S> {
    pub payload: &'a P,
    pub shared_state: &'a mut S,
    pub job: &'a JobContext,
    pub step_results: &'a StepResults,
    /// The error that triggered the unwind.
    pub reason: &'a (dyn Error + Send + Sync),
    /// Id of the step whose failure triggered the unwind.
    pub failed_step_id: &'a str,
}

/// The forward action of a step.
///
/// `P` is the payload type and `S` the shared-state type of the workflow the
/// step belongs to.
#[async_trait]
pub trait ExecuteStep<P, S>: Send + Sync
where
    P: Send + Sync + 'static,
    S: Send + 'static,
{
    /// Run the step and return its JSON output.
    async fn execute(&self, args: StepArgs<'_, P, S>) -> Result<Value, StepError>;
}

/// The compensating action of a step, undoing what `execute` did.
#[async_trait]
pub trait CompensateStep<P, S>: Send + Sync
where
    P: Send + Sync + 'static,
    S: Send + 'static,
{
    async fn compensate(&self, args: CompensationArgs<'_, P, S>) -> Result<(), StepError>;
}
