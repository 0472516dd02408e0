//! Step executor — runs exactly one step of an execution.
//!
//! For each step it:
//! 1. Re-checks that every declared dependency already completed.
//! 2. Appends an `in_progress` snapshot and emits `step:start`.
//! 3. Awaits the step's execute action to completion.
//! 4. On success marks the snapshot `completed`, stores the output and
//!    emits `step:completed`.
//! 5. On failure marks the snapshot `failed`, emits `step:failed`, unwinds
//!    earlier steps through the [`Compensator`] and returns the error.

use steps::{JobContext, StepArgs};
use tracing::{debug, error, instrument};

use crate::compensator::Compensator;
use crate::error::WorkflowError;
use crate::events::{EventEmitter, EventKind, WorkflowEvent};
use crate::metrics::{MetricsSink, Outcome};
use crate::models::StepDefinition;
use crate::state::RuntimeState;

pub(crate) struct StepExecutor<'w, P, S>
where
    P: Send + Sync + 'static,
    S: Send + 'static,
{
    pub(crate) job_name: &'w str,
    pub(crate) steps: &'w [StepDefinition<P, S>],
    pub(crate) emitter: &'w EventEmitter,
    pub(crate) metrics: &'w dyn MetricsSink,
}

impl<'w, P, S> StepExecutor<'w, P, S>
where
    P: Send + Sync + 'static,
    S: Send + 'static,
{
    /// Run `step` against `state`.
    ///
    /// # Errors
    /// - [`WorkflowError::DependencyViolation`] if a prerequisite has not
    ///   completed; nothing is started or compensated in that case.
    /// - The step's own failure once compensation has finished, or the
    ///   compensation error if the unwind itself failed.
    #[instrument(skip_all, fields(step_id = %step.id()))]
    pub(crate) async fn run(
        &self,
        step: &StepDefinition<P, S>,
        payload: &P,
        state: &mut RuntimeState<S>,
        job: &JobContext,
    ) -> Result<(), WorkflowError> {
        if let Some(missing) = step
            .dependencies()
            .iter()
            .find(|dep| !state.is_completed(dep.as_str()))
        {
            return Err(WorkflowError::DependencyViolation {
                step_id: step.id().to_owned(),
                dependency: missing.clone(),
            });
        }

        let index = state.begin_step(step.id());

        match self.attempt(step, index, payload, state, job).await {
            Ok(()) => {
                debug!(
                    "step '{}' completed in {}ms",
                    step.id(),
                    state.snapshots[index].duration_ms.unwrap_or_default()
                );
                self.metrics.record_step(self.job_name, step.id(), Outcome::Success);
                Ok(())
            }

            Err(err) => {
                // The output is only stored once the step has run, but an
                // observer can still fail it after that.
                state.step_results.remove(step.id());
                state.snapshots[index].fail(step_error_message(&err));
                error!("step '{}' failed: {}", step.id(), err);
                self.metrics.record_step(self.job_name, step.id(), Outcome::Failure);

                let workflow_id = state.workflow_id;
                let snapshot = &state.snapshots[index];
                self.emitter
                    .emit(|| {
                        WorkflowEvent::new(EventKind::StepFailed, workflow_id, job)
                            .with_snapshot(snapshot)
                            .with_error(&err)
                    })
                    .await?;

                Compensator {
                    job_name: self.job_name,
                    steps: self.steps,
                    emitter: self.emitter,
                    metrics: self.metrics,
                }
                .run(step.id(), &err, payload, state, job)
                .await?;

                Err(err)
            }
        }
    }

    async fn attempt(
        &self,
        step: &StepDefinition<P, S>,
        index: usize,
        payload: &P,
        state: &mut RuntimeState<S>,
        job: &JobContext,
    ) -> Result<(), WorkflowError> {
        let workflow_id = state.workflow_id;

        let snapshot = &state.snapshots[index];
        self.emitter
            .emit(|| WorkflowEvent::new(EventKind::StepStart, workflow_id, job).with_snapshot(snapshot))
            .await?;

        let output = step
            .execute
            .execute(StepArgs {
                payload,
                shared_state: &mut state.shared_state,
                job,
                step_results: &state.step_results,
            })
            .await
            .map_err(|source| WorkflowError::StepFailed {
                step_id: step.id().to_owned(),
                source,
            })?;

        state.snapshots[index].complete();
        state.step_results.insert(step.id().to_owned(), output);

        let snapshot = &state.snapshots[index];
        let output = &state.step_results[step.id()];
        self.emitter
            .emit(|| {
                WorkflowEvent::new(EventKind::StepCompleted, workflow_id, job)
                    .with_snapshot(snapshot)
                    .with_result(output.clone())
            })
            .await
    }
}

/// The message stored on a failed snapshot: the step's own error when
/// there is one, otherwise the workflow error.
fn step_error_message(err: &WorkflowError) -> String {
    match err {
        WorkflowError::StepFailed { source, .. } => source.to_string(),
        other => other.to_string(),
    }
}
