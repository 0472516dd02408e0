//! `MockStep` — a test double for `ExecuteStep` and `CompensateStep`.
//!
//! Useful in unit and integration tests where a real step implementation is
//! either unavailable or irrelevant.  Clones share their call log, so one
//! clone can be registered as the execute slot and another as the
//! compensate slot of the same step definition.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::{CompensateStep, CompensationArgs, ExecuteStep, StepArgs, StepError};

/// Behaviour injected into `MockStep` at construction time.
#[derive(Debug, Clone)]
pub enum MockBehaviour {
    /// Return a specific JSON value.
    ReturnValue(Value),
    /// Fail with a `Retryable` error.
    FailRetryable(String),
    /// Fail with a `Fatal` error.
    FailFatal(String),
    /// Fail with a `Retryable` error for the first `times` calls, then
    /// return the value.
    FlakyThenReturn { times: usize, value: Value },
}

/// One recorded invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum MockCall {
    Execute { attempt: u32 },
    Compensate { failed_step_id: String, reason: String },
}

/// A mock step that records every call it receives and returns a
/// programmer-specified result.
#[derive(Clone)]
pub struct MockStep {
    /// Label used in journal entries and outputs.
    pub name: String,
    /// What the step will do when `execute` is called.
    pub behaviour: MockBehaviour,
    /// `Some(msg)` makes `compensate` fail with a fatal error.
    pub compensation_failure: Option<String>,
    /// All calls seen by this step (in call order).
    pub calls: Arc<Mutex<Vec<MockCall>>>,
    journal: Option<Arc<Mutex<Vec<String>>>>,
}

impl MockStep {
    fn with_behaviour(name: impl Into<String>, behaviour: MockBehaviour) -> Self {
        Self {
            name: name.into(),
            behaviour,
            compensation_failure: None,
            calls: Arc::new(Mutex::new(Vec::new())),
            journal: None,
        }
    }

    /// Create a mock that always succeeds with the given value.
    pub fn returning(name: impl Into<String>, value: Value) -> Self {
        Self::with_behaviour(name, MockBehaviour::ReturnValue(value))
    }

    /// Create a mock that always fails with a `Fatal` error.
    pub fn failing_fatal(name: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::with_behaviour(name, MockBehaviour::FailFatal(msg.into()))
    }

    /// Create a mock that always fails with a `Retryable` error.
    pub fn failing_retryable(name: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::with_behaviour(name, MockBehaviour::FailRetryable(msg.into()))
    }

    /// Create a mock that fails retryably `times` times, then succeeds.
    pub fn flaky(name: impl Into<String>, times: usize, value: Value) -> Self {
        Self::with_behaviour(name, MockBehaviour::FlakyThenReturn { times, value })
    }

    /// Make `compensate` fail with the given message.
    pub fn with_failing_compensation(mut self, msg: impl Into<String>) -> Self {
        self.compensation_failure = Some(msg.into());
        self
    }

    /// Append `execute:<name>` / `compensate:<name>` entries to a log
    /// shared with other mocks.
    pub fn with_journal(mut self, journal: Arc<Mutex<Vec<String>>>) -> Self {
        self.journal = Some(journal);
        self
    }

    /// Number of times this step has been executed.
    pub fn call_count(&self) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| matches!(c, MockCall::Execute { .. }))
            .count()
    }

    /// Number of times this step has been compensated (successfully or not).
    pub fn compensation_count(&self) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| matches!(c, MockCall::Compensate { .. }))
            .count()
    }

    fn record(&self, call: MockCall, entry: String) {
        self.calls.lock().unwrap().push(call);
        if let Some(journal) = &self.journal {
            journal.lock().unwrap().push(entry);
        }
    }
}

#[async_trait]
impl<P, S> ExecuteStep<P, S> for MockStep
where
    P: Send + Sync + 'static,
    S: Send + 'static,
{
    async fn execute(&self, args: StepArgs<'_, P, S>) -> Result<Value, StepError> {
        let previous = self.call_count();
        self.record(
            MockCall::Execute { attempt: args.job.attempt },
            format!("execute:{}", self.name),
        );

        let value = match &self.behaviour {
            MockBehaviour::ReturnValue(v) => v,
            MockBehaviour::FailRetryable(msg) => return Err(StepError::Retryable(msg.clone())),
            MockBehaviour::FailFatal(msg) => return Err(StepError::Fatal(msg.clone())),
            MockBehaviour::FlakyThenReturn { times, value } => {
                if previous < *times {
                    return Err(StepError::Retryable(format!(
                        "{} flaked on call {}",
                        self.name,
                        previous + 1
                    )));
                }
                value
            }
        };

        // Merge the step's own name into the output so tests can trace
        // which step produced a value.
        let mut out = json!({ "step": self.name });
        if let (Some(out_obj), Some(v_obj)) = (out.as_object_mut(), value.as_object()) {
            for (k, val) in v_obj {
                out_obj.insert(k.clone(), val.clone());
            }
        }
        Ok(out)
    }
}

#[async_trait]
impl<P, S> CompensateStep<P, S> for MockStep
where
    P: Send + Sync + 'static,
    S: Send + 'static,
{
    async fn compensate(&self, args: CompensationArgs<'_, P, S>) -> Result<(), StepError> {
        self.record(
            MockCall::Compensate {
                failed_step_id: args.failed_step_id.to_owned(),
                reason: args.reason.to_string(),
            },
            format!("compensate:{}", self.name),
        );

        match &self.compensation_failure {
            Some(msg) => Err(StepError::Fatal(msg.clone())),
            None => Ok(()),
        }
    }
}
