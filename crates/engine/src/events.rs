//! Lifecycle events and the observer fan-out.
//!
//! Observers are notified sequentially per event but concurrently among
//! themselves: every registered observer receives the event at once and the
//! orchestrator waits for all of them before it continues.  An observer
//! error propagates into the execution that emitted the event.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use serde::Serialize;
use serde_json::Value;
use steps::JobContext;
use tracing::info;
use uuid::Uuid;

use crate::error::WorkflowError;
use crate::models::StepSnapshot;

/// Which lifecycle transition an event reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum EventKind {
    #[serde(rename = "workflow:start")]
    WorkflowStart,
    #[serde(rename = "workflow:completed")]
    WorkflowCompleted,
    #[serde(rename = "workflow:failed")]
    WorkflowFailed,
    #[serde(rename = "step:start")]
    StepStart,
    #[serde(rename = "step:completed")]
    StepCompleted,
    #[serde(rename = "step:failed")]
    StepFailed,
    #[serde(rename = "step:compensated")]
    StepCompensated,
}

impl EventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::WorkflowStart     => "workflow:start",
            Self::WorkflowCompleted => "workflow:completed",
            Self::WorkflowFailed    => "workflow:failed",
            Self::StepStart         => "step:start",
            Self::StepCompleted     => "step:completed",
            Self::StepFailed        => "step:failed",
            Self::StepCompensated   => "step:compensated",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One lifecycle notification.
#[derive(Debug, Clone)]
pub struct WorkflowEvent {
    pub kind: EventKind,
    pub workflow_id: Uuid,
    pub job: JobContext,
    pub step_id: Option<String>,
    pub error: Option<String>,
    pub snapshot: Option<StepSnapshot>,
    pub result: Option<Value>,
}

impl WorkflowEvent {
    pub fn new(kind: EventKind, workflow_id: Uuid, job: &JobContext) -> Self {
        Self {
            kind,
            workflow_id,
            job: job.clone(),
            step_id: None,
            error: None,
            snapshot: None,
            result: None,
        }
    }

    /// Attach a step snapshot; also sets `step_id`.
    pub fn with_snapshot(mut self, snapshot: &StepSnapshot) -> Self {
        self.step_id = Some(snapshot.id.clone());
        self.snapshot = Some(snapshot.clone());
        self
    }

    pub fn with_error(mut self, error: impl fmt::Display) -> Self {
        self.error = Some(error.to_string());
        self
    }

    pub fn with_result(mut self, result: Value) -> Self {
        self.result = Some(result);
        self
    }
}

/// External listener for lifecycle events (visualisation, auditing, ...).
///
/// Observers run on the orchestration path, so they should be fast and
/// should swallow their own transient failures.
#[async_trait]
pub trait WorkflowObserver: Send + Sync {
    async fn on_event(&self, event: &WorkflowEvent) -> anyhow::Result<()>;
}

/// Ordered registry of observers.
#[derive(Clone, Default)]
pub struct EventEmitter {
    observers: Vec<Arc<dyn WorkflowObserver>>,
}

impl EventEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, observer: Arc<dyn WorkflowObserver>) {
        self.observers.push(observer);
    }

    pub fn len(&self) -> usize {
        self.observers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }

    /// Deliver the event built by `build` to every observer.
    ///
    /// `build` is not called when nothing is registered.
    ///
    /// # Errors
    /// [`WorkflowError::Observer`] carrying the first observer error, in
    /// registration order.  All observers still receive the event.
    pub async fn emit<F>(&self, build: F) -> Result<(), WorkflowError>
    where
        F: FnOnce() -> WorkflowEvent,
    {
        if self.observers.is_empty() {
            return Ok(());
        }

        let event = build();
        let outcomes = join_all(self.observers.iter().map(|o| o.on_event(&event))).await;

        outcomes
            .into_iter()
            .collect::<anyhow::Result<Vec<()>>>()
            .map(drop)
            .map_err(|source| WorkflowError::Observer { event: event.kind, source })
    }
}

impl fmt::Debug for EventEmitter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventEmitter")
            .field("observers", &self.observers.len())
            .finish()
    }
}

/// Observer that writes every event to the `tracing` log.
#[derive(Debug, Clone, Default)]
pub struct TracingObserver;

#[async_trait]
impl WorkflowObserver for TracingObserver {
    async fn on_event(&self, event: &WorkflowEvent) -> anyhow::Result<()> {
        info!(
            target: "saga::events",
            parent: &event.job.span,
            event = %event.kind,
            workflow_id = %event.workflow_id,
            step_id = event.step_id.as_deref().unwrap_or("-"),
            error = event.error.as_deref().unwrap_or(""),
            "workflow event"
        );
        Ok(())
    }
}
