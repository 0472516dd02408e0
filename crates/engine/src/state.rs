//! Per-execution runtime state.

use chrono::{DateTime, Utc};
use steps::StepResults;
use uuid::Uuid;

use crate::models::{StepSnapshot, StepStatus};

/// Mutable record owned by exactly one workflow execution.
///
/// Created fresh when an execution starts and consumed into the
/// execution's result when it ends; never shared between executions.
#[derive(Debug)]
pub struct RuntimeState<S> {
    pub workflow_id: Uuid,
    pub shared_state: S,
    pub step_results: StepResults,
    /// One snapshot per step started, in start order.  Steps run one at a
    /// time, so this is also completion order.
    pub snapshots: Vec<StepSnapshot>,
    pub started_at: DateTime<Utc>,
}

impl<S> RuntimeState<S> {
    pub fn new(shared_state: S) -> Self {
        Self {
            workflow_id: Uuid::new_v4(),
            shared_state,
            step_results: StepResults::new(),
            snapshots: Vec::new(),
            started_at: Utc::now(),
        }
    }

    /// Append an `in_progress` snapshot for `step_id` and return its index.
    pub(crate) fn begin_step(&mut self, step_id: &str) -> usize {
        self.snapshots.push(StepSnapshot::started(step_id));
        self.snapshots.len() - 1
    }

    /// Whether `step_id` has a snapshot with status `completed`.
    pub fn is_completed(&self, step_id: &str) -> bool {
        self.snapshots
            .iter()
            .any(|s| s.id == step_id && s.status == StepStatus::Completed)
    }

    /// Indices of `completed` snapshots, most recently completed first.
    pub(crate) fn completed_newest_first(&self) -> Vec<usize> {
        self.snapshots
            .iter()
            .enumerate()
            .rev()
            .filter(|(_, s)| s.status == StepStatus::Completed)
            .map(|(i, _)| i)
            .collect()
    }
}
