//! Metrics sink.
//!
//! Every call is fire-and-forget and returns `()`, so a sink has no way to
//! change the outcome of an execution.  Implementations must deal with
//! their own failures.

use std::fmt;
use std::sync::{Mutex, PoisonError};

use serde::Serialize;
use tracing::info;

/// Outcome label attached to completion and step metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Success,
    Failure,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::Failure => write!(f, "failure"),
        }
    }
}

pub trait MetricsSink: Send + Sync {
    fn record_workflow_completion(&self, job_name: &str, duration_ms: u64, outcome: Outcome);
    fn record_step(&self, job_name: &str, step_id: &str, outcome: Outcome);
    fn record_compensation(&self, job_name: &str, step_id: &str);
}

/// Discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopMetrics;

impl MetricsSink for NoopMetrics {
    fn record_workflow_completion(&self, _job_name: &str, _duration_ms: u64, _outcome: Outcome) {}
    fn record_step(&self, _job_name: &str, _step_id: &str, _outcome: Outcome) {}
    fn record_compensation(&self, _job_name: &str, _step_id: &str) {}
}

/// Emits one structured log line per metric under the `saga::metrics` target.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingMetrics;

impl MetricsSink for TracingMetrics {
    fn record_workflow_completion(&self, job_name: &str, duration_ms: u64, outcome: Outcome) {
        info!(target: "saga::metrics", job_name, duration_ms, %outcome, "workflow_completion");
    }

    fn record_step(&self, job_name: &str, step_id: &str, outcome: Outcome) {
        info!(target: "saga::metrics", job_name, step_id, %outcome, "step");
    }

    fn record_compensation(&self, job_name: &str, step_id: &str) {
        info!(target: "saga::metrics", job_name, step_id, "compensation");
    }
}

/// One recorded metric call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "metric", rename_all = "snake_case")]
pub enum MetricRecord {
    WorkflowCompletion { job_name: String, duration_ms: u64, outcome: Outcome },
    Step { job_name: String, step_id: String, outcome: Outcome },
    Compensation { job_name: String, step_id: String },
}

/// Keeps every call in memory.
#[derive(Debug, Default)]
pub struct InMemoryMetrics {
    records: Mutex<Vec<MetricRecord>>,
}

impl InMemoryMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything recorded so far, in call order.
    pub fn records(&self) -> Vec<MetricRecord> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of `record_step` calls with the given outcome.
    pub fn step_count(&self, outcome: Outcome) -> usize {
        self.records()
            .iter()
            .filter(|r| matches!(r, MetricRecord::Step { outcome: o, .. } if *o == outcome))
            .count()
    }

    /// Step ids passed to `record_compensation`, in call order.
    pub fn compensations(&self) -> Vec<String> {
        self.records()
            .into_iter()
            .filter_map(|r| match r {
                MetricRecord::Compensation { step_id, .. } => Some(step_id),
                _ => None,
            })
            .collect()
    }

    fn push(&self, record: MetricRecord) {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(record);
    }
}

impl MetricsSink for InMemoryMetrics {
    fn record_workflow_completion(&self, job_name: &str, duration_ms: u64, outcome: Outcome) {
        self.push(MetricRecord::WorkflowCompletion {
            job_name: job_name.to_owned(),
            duration_ms,
            outcome,
        });
    }

    fn record_step(&self, job_name: &str, step_id: &str, outcome: Outcome) {
        self.push(MetricRecord::Step {
            job_name: job_name.to_owned(),
            step_id: step_id.to_owned(),
            outcome,
        });
    }

    fn record_compensation(&self, job_name: &str, step_id: &str) {
        self.push(MetricRecord::Compensation {
            job_name: job_name.to_owned(),
            step_id: step_id.to_owned(),
        });
    }
}
