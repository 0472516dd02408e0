//! Compensator — unwinds completed steps after a failure.
//!
//! Only steps that both declare a compensation action and have a
//! `completed` snapshot are unwound, most recently completed first.  The
//! unwind is all-or-nothing: the first compensation error stops it and
//! becomes the execution's terminating error, leaving every step it did not
//! reach in `completed`.

use std::error::Error;

use steps::{CompensationArgs, JobContext};
use tracing::{error, info, instrument, warn};

use crate::error::WorkflowError;
use crate::events::{EventEmitter, EventKind, WorkflowEvent};
use crate::metrics::MetricsSink;
use crate::models::StepDefinition;
use crate::state::RuntimeState;

pub(crate) struct Compensator<'w, P, S>
where
    P: Send + Sync + 'static,
    S: Send + 'static,
{
    pub(crate) job_name: &'w str,
    pub(crate) steps: &'w [StepDefinition<P, S>],
    pub(crate) emitter: &'w EventEmitter,
    pub(crate) metrics: &'w dyn MetricsSink,
}

impl<'w, P, S> Compensator<'w, P, S>
where
    P: Send + Sync + 'static,
    S: Send + 'static,
{
    /// Compensate everything that completed before `failed_step_id` failed.
    ///
    /// # Errors
    /// [`WorkflowError::CompensationFailed`] for the first compensation that
    /// fails, or an observer error raised while reporting the unwind.
    #[instrument(skip_all, fields(failed_step_id = %failed_step_id))]
    pub(crate) async fn run(
        &self,
        failed_step_id: &str,
        reason: &(dyn Error + Send + Sync),
        payload: &P,
        state: &mut RuntimeState<S>,
        job: &JobContext,
    ) -> Result<(), WorkflowError> {
        let plan: Vec<(usize, &StepDefinition<P, S>)> = state
            .completed_newest_first()
            .into_iter()
            .filter_map(|index| {
                let id = &state.snapshots[index].id;
                self.steps
                    .iter()
                    .find(|step| step.id() == id && step.is_compensable())
                    .map(|step| (index, step))
            })
            .collect();

        if plan.is_empty() {
            return Ok(());
        }

        warn!(
            "step '{}' failed, compensating {} completed step(s)",
            failed_step_id,
            plan.len()
        );

        let workflow_id = state.workflow_id;

        for (index, step) in plan {
            let Some(compensate) = step.compensate.as_ref() else {
                continue;
            };

            let outcome = compensate
                .compensate(CompensationArgs {
                    payload,
                    shared_state: &mut state.shared_state,
                    job,
                    step_results: &state.step_results,
                    reason,
                    failed_step_id,
                })
                .await;

            match outcome {
                Ok(()) => {
                    state.snapshots[index].compensated();
                    info!("step '{}' compensated", step.id());
                    self.metrics.record_compensation(self.job_name, step.id());

                    let snapshot = &state.snapshots[index];
                    self.emitter
                        .emit(|| {
                            WorkflowEvent::new(EventKind::StepCompensated, workflow_id, job)
                                .with_snapshot(snapshot)
                        })
                        .await?;
                }

                Err(source) => {
                    error!("compensation of step '{}' failed: {}", step.id(), source);
                    state.snapshots[index].fail(&source);

                    let snapshot = &state.snapshots[index];
                    self.emitter
                        .emit(|| {
                            WorkflowEvent::new(EventKind::StepFailed, workflow_id, job)
                                .with_snapshot(snapshot)
                                .with_error(&source)
                        })
                        .await?;

                    return Err(WorkflowError::CompensationFailed {
                        step_id: step.id().to_owned(),
                        failed_step_id: failed_step_id.to_owned(),
                        source,
                    });
                }
            }
        }

        Ok(())
    }
}
