//! Core domain models for the orchestration engine.
//!
//! A [`StepDefinition`] describes one step of a workflow type; a
//! [`StepSnapshot`] records what happened to it during one execution.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use steps::{CompensateStep, ExecuteStep};

// ---------------------------------------------------------------------------
// StepDefinition
// ---------------------------------------------------------------------------

/// A single step of a workflow: an id, its prerequisites, and the two
/// callable slots.
pub struct StepDefinition<P, S>
where
    P: Send + Sync + 'static,
    S: Send + 'static,
{
    id: String,
    description: Option<String>,
    depends_on: Vec<String>,
    pub(crate) execute: Arc<dyn ExecuteStep<P, S>>,
    pub(crate) compensate: Option<Arc<dyn CompensateStep<P, S>>>,
}

impl<P, S> StepDefinition<P, S>
where
    P: Send + Sync + 'static,
    S: Send + 'static,
{
    pub fn new(id: impl Into<String>, execute: impl ExecuteStep<P, S> + 'static) -> Self {
        Self {
            id: id.into(),
            description: None,
            depends_on: Vec::new(),
            execute: Arc::new(execute),
            compensate: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Declare prerequisite steps.  They must appear earlier in the
    /// workflow's step list; the engine does not reorder steps.
    pub fn depends_on<I, T>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.depends_on.extend(ids.into_iter().map(Into::into));
        self
    }

    pub fn with_compensation(mut self, compensate: impl CompensateStep<P, S> + 'static) -> Self {
        self.compensate = Some(Arc::new(compensate));
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn dependencies(&self) -> &[String] {
        &self.depends_on
    }

    pub fn is_compensable(&self) -> bool {
        self.compensate.is_some()
    }
}

impl<P, S> fmt::Debug for StepDefinition<P, S>
where
    P: Send + Sync + 'static,
    S: Send + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StepDefinition")
            .field("id", &self.id)
            .field("description", &self.description)
            .field("depends_on", &self.depends_on)
            .field("compensable", &self.is_compensable())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// StepStatus
// ---------------------------------------------------------------------------

/// Lifecycle of one step within one execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
    Compensated,
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending     => write!(f, "pending"),
            Self::InProgress  => write!(f, "in_progress"),
            Self::Completed   => write!(f, "completed"),
            Self::Failed      => write!(f, "failed"),
            Self::Compensated => write!(f, "compensated"),
        }
    }
}

impl FromStr for StepStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending"     => Ok(Self::Pending),
            "in_progress" => Ok(Self::InProgress),
            "completed"   => Ok(Self::Completed),
            "failed"      => Ok(Self::Failed),
            "compensated" => Ok(Self::Compensated),
            other         => Err(format!("unknown step status: {other}")),
        }
    }
}

// ---------------------------------------------------------------------------
// StepSnapshot
// ---------------------------------------------------------------------------

/// Recorded status, timing and error of one step execution attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepSnapshot {
    pub id: String,
    pub status: StepStatus,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StepSnapshot {
    /// A fresh `in_progress` snapshot starting now.
    pub fn started(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            status: StepStatus::InProgress,
            started_at: Utc::now(),
            completed_at: None,
            duration_ms: None,
            error: None,
        }
    }

    pub(crate) fn complete(&mut self) {
        self.status = StepStatus::Completed;
        self.finish();
    }

    pub(crate) fn fail(&mut self, error: impl fmt::Display) {
        self.status = StepStatus::Failed;
        self.error = Some(error.to_string());
        self.finish();
    }

    pub(crate) fn compensated(&mut self) {
        self.status = StepStatus::Compensated;
    }

    fn finish(&mut self) {
        let now = Utc::now();
        self.completed_at = Some(now);
        self.duration_ms = Some(millis_between(self.started_at, now));
    }
}

/// Whole milliseconds from `start` to `end`, clamped at zero.
pub(crate) fn millis_between(start: DateTime<Utc>, end: DateTime<Utc>) -> u64 {
    u64::try_from((end - start).num_milliseconds()).unwrap_or(0)
}
