//! Workflow orchestrator — the top-level driver.
//!
//! `Workflow` is the workflow *type*: an ordered step list plus the hooks
//! and sinks shared by every execution.  Each call to
//! [`Workflow::execute`] is one execution:
//! 1. Validates the step list (once per workflow, result cached).
//! 2. Creates a fresh [`RuntimeState`] and emits `workflow:start`.
//! 3. Runs every step in declaration order through the step executor.
//! 4. On success computes the result with the completion hook, records the
//!    completion metric and emits `workflow:completed`.
//! 5. On failure records the completion metric, emits `workflow:failed` and
//!    surfaces the terminating error.

use std::fmt;
use std::sync::{Arc, OnceLock};

use chrono::Utc;
use serde_json::Value;
use steps::{JobContext, StepResults};
use tracing::{error, info, info_span, Instrument};

use crate::error::{ConfigError, WorkflowError};
use crate::events::{EventEmitter, EventKind, WorkflowEvent, WorkflowObserver};
use crate::executor::StepExecutor;
use crate::metrics::{MetricsSink, NoopMetrics, Outcome};
use crate::models::{millis_between, StepDefinition};
use crate::result::{WorkflowFailure, WorkflowResult, WorkflowSuccess};
use crate::state::RuntimeState;
use crate::validation::validate_steps;

/// Produces the initial shared state of an execution.
pub type StateFactory<S> = Box<dyn Fn() -> S + Send + Sync>;

/// Computes an execution's `result` once every step has completed.
pub type CompletionHook<S> = Box<dyn Fn(&S, &StepResults) -> Value + Send + Sync>;

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

pub struct WorkflowBuilder<P, S>
where
    P: Send + Sync + 'static,
    S: Send + 'static,
{
    name: String,
    steps: Vec<StepDefinition<P, S>>,
    initial_state: StateFactory<S>,
    on_complete: Option<CompletionHook<S>>,
    emitter: EventEmitter,
    metrics: Arc<dyn MetricsSink>,
}

impl<P, S> WorkflowBuilder<P, S>
where
    P: Send + Sync + 'static,
    S: Send + 'static,
{
    fn new(name: String, initial_state: StateFactory<S>) -> Self {
        Self {
            name,
            steps: Vec::new(),
            initial_state,
            on_complete: None,
            emitter: EventEmitter::new(),
            metrics: Arc::new(NoopMetrics),
        }
    }

    /// Append a step.  Steps run in the order they are added.
    pub fn step(mut self, step: StepDefinition<P, S>) -> Self {
        self.steps.push(step);
        self
    }

    pub fn steps(mut self, steps: impl IntoIterator<Item = StepDefinition<P, S>>) -> Self {
        self.steps.extend(steps);
        self
    }

    /// Replace the factory producing each execution's initial shared state.
    pub fn initial_state(mut self, factory: impl Fn() -> S + Send + Sync + 'static) -> Self {
        self.initial_state = Box::new(factory);
        self
    }

    /// Replace the default completion hook, which returns the last step's
    /// output.
    pub fn on_complete(
        mut self,
        hook: impl Fn(&S, &StepResults) -> Value + Send + Sync + 'static,
    ) -> Self {
        self.on_complete = Some(Box::new(hook));
        self
    }

    pub fn observer(mut self, observer: Arc<dyn WorkflowObserver>) -> Self {
        self.emitter.register(observer);
        self
    }

    pub fn metrics(mut self, metrics: Arc<dyn MetricsSink>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn build(self) -> Workflow<P, S> {
        Workflow {
            name: self.name,
            steps: self.steps,
            initial_state: self.initial_state,
            on_complete: self.on_complete,
            emitter: self.emitter,
            metrics: self.metrics,
            validated: OnceLock::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Workflow
// ---------------------------------------------------------------------------

/// A workflow type, safe to share between concurrent executions.
///
/// Executions never share mutable state: each one owns its own
/// [`RuntimeState`].
pub struct Workflow<P, S>
where
    P: Send + Sync + 'static,
    S: Send + 'static,
{
    name: String,
    steps: Vec<StepDefinition<P, S>>,
    initial_state: StateFactory<S>,
    on_complete: Option<CompletionHook<S>>,
    emitter: EventEmitter,
    metrics: Arc<dyn MetricsSink>,
    validated: OnceLock<Result<(), ConfigError>>,
}

impl<P, S> Workflow<P, S>
where
    P: Send + Sync + 'static,
    S: Default + Send + 'static,
{
    /// Start a workflow whose executions begin from `S::default()`.
    pub fn builder(name: impl Into<String>) -> WorkflowBuilder<P, S> {
        WorkflowBuilder::new(name.into(), Box::new(S::default))
    }
}

impl<P, S> Workflow<P, S>
where
    P: Send + Sync + 'static,
    S: Send + 'static,
{
    /// Start a workflow whose initial shared state comes from `factory`.
    pub fn builder_with_state(
        name: impl Into<String>,
        factory: impl Fn() -> S + Send + Sync + 'static,
    ) -> WorkflowBuilder<P, S> {
        WorkflowBuilder::new(name.into(), Box::new(factory))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn steps(&self) -> &[StepDefinition<P, S>] {
        &self.steps
    }

    /// Validate the step list.  Only the first call does any work.
    ///
    /// # Errors
    /// The [`ConfigError`] found by [`validate_steps`], on every call.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validated
            .get_or_init(|| {
                let outcome = validate_steps(&self.steps);
                if let Err(e) = &outcome {
                    error!("workflow '{}' is misconfigured: {}", self.name, e);
                }
                outcome
            })
            .clone()
    }

    /// Run one execution and return its success result or terminating
    /// error.
    ///
    /// # Errors
    /// A [`WorkflowError::Config`] if validation fails, otherwise the step,
    /// compensation, dependency or observer error that ended the execution.
    /// Use [`Workflow::execute_with_report`] to also get the snapshots and
    /// shared state of a failed execution.
    pub async fn execute(
        &self,
        payload: &P,
        job: &JobContext,
    ) -> Result<WorkflowSuccess<S>, WorkflowError> {
        self.execute_with_report(payload, job).await?.into_result()
    }

    /// Run one execution and return its full result, success or failure.
    ///
    /// # Errors
    /// Only a [`ConfigError`]: an invalid workflow never starts running.
    pub async fn execute_with_report(
        &self,
        payload: &P,
        job: &JobContext,
    ) -> Result<WorkflowResult<S>, ConfigError> {
        self.validate()?;

        let state = RuntimeState::new((self.initial_state)());
        let span = info_span!(
            parent: &job.span,
            "workflow",
            workflow = %self.name,
            workflow_id = %state.workflow_id,
            attempt = job.attempt,
        );

        Ok(self.run(payload, state, job).instrument(span).await)
    }

    async fn run(&self, payload: &P, mut state: RuntimeState<S>, job: &JobContext) -> WorkflowResult<S> {
        info!("workflow '{}' starting with {} step(s)", self.name, self.steps.len());

        match self.drive(payload, &mut state, job).await {
            Ok(()) => self.succeed(state, job).await,
            Err(err) => self.fail(state, err, job).await,
        }
    }

    async fn drive(
        &self,
        payload: &P,
        state: &mut RuntimeState<S>,
        job: &JobContext,
    ) -> Result<(), WorkflowError> {
        let workflow_id = state.workflow_id;
        self.emitter
            .emit(|| WorkflowEvent::new(EventKind::WorkflowStart, workflow_id, job))
            .await?;

        let executor = StepExecutor {
            job_name: &self.name,
            steps: &self.steps,
            emitter: &self.emitter,
            metrics: self.metrics.as_ref(),
        };

        for step in &self.steps {
            executor.run(step, payload, state, job).await?;
        }

        Ok(())
    }

    async fn succeed(&self, state: RuntimeState<S>, job: &JobContext) -> WorkflowResult<S> {
        let result = match &self.on_complete {
            Some(hook) => hook(&state.shared_state, &state.step_results),
            None => self.last_output(&state.step_results),
        };

        let completed_at = Utc::now();
        let duration_ms = millis_between(state.started_at, completed_at);
        self.metrics
            .record_workflow_completion(&self.name, duration_ms, Outcome::Success);

        let workflow_id = state.workflow_id;
        let notified = self
            .emitter
            .emit(|| {
                WorkflowEvent::new(EventKind::WorkflowCompleted, workflow_id, job)
                    .with_result(result.clone())
            })
            .await;

        if let Err(err) = notified {
            // Completion was already recorded; report the observer error
            // without a second metric or `workflow:failed` event.
            error!("workflow '{}' completed but an observer failed: {}", self.name, err);
            return WorkflowResult::Failure(WorkflowFailure {
                workflow_id,
                failed_at: completed_at,
                duration_ms,
                error: err,
                shared_state: state.shared_state,
                step_results: state.step_results,
                steps: state.snapshots,
            });
        }

        info!("workflow '{}' execution {} succeeded in {}ms", self.name, workflow_id, duration_ms);

        WorkflowResult::Success(WorkflowSuccess {
            workflow_id,
            completed_at,
            duration_ms,
            result,
            shared_state: state.shared_state,
            step_results: state.step_results,
            steps: state.snapshots,
        })
    }

    async fn fail(&self, state: RuntimeState<S>, err: WorkflowError, job: &JobContext) -> WorkflowResult<S> {
        let failed_at = Utc::now();
        let duration_ms = millis_between(state.started_at, failed_at);
        error!("workflow '{}' execution {} failed: {}", self.name, state.workflow_id, err);

        self.metrics
            .record_workflow_completion(&self.name, duration_ms, Outcome::Failure);

        let workflow_id = state.workflow_id;
        let notified = self
            .emitter
            .emit(|| WorkflowEvent::new(EventKind::WorkflowFailed, workflow_id, job).with_error(&err))
            .await;
        let error = match notified {
            Ok(()) => err,
            Err(observer_err) => observer_err,
        };

        WorkflowResult::Failure(WorkflowFailure {
            workflow_id,
            failed_at,
            duration_ms,
            error,
            shared_state: state.shared_state,
            step_results: state.step_results,
            steps: state.snapshots,
        })
    }

    /// Default result: the output of the last declared step.
    fn last_output(&self, results: &StepResults) -> Value {
        self.steps
            .last()
            .and_then(|step| results.get(step.id()))
            .cloned()
            .unwrap_or(Value::Null)
    }
}

impl<P, S> fmt::Debug for Workflow<P, S>
where
    P: Send + Sync + 'static,
    S: Send + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Workflow")
            .field("name", &self.name)
            .field("steps", &self.steps)
            .field("emitter", &self.emitter)
            .finish_non_exhaustive()
    }
}
