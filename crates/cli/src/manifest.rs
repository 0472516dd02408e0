//! Workflow manifests — JSON descriptions of scripted workflows.
//!
//! A scripted step does not talk to anything.  It writes its configured
//! output into the shared-state object under its own id, removes it again
//! when compensated, and fails on demand, which is enough to rehearse how a
//! saga unwinds before wiring real steps in.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use engine::{MetricsSink, StepDefinition, TracingObserver, Workflow};
use serde::Deserialize;
use serde_json::{json, Value};
use steps::{CompensateStep, CompensationArgs, ExecuteStep, StepArgs, StepError};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("cannot read manifest {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid manifest: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Top-level manifest document.
#[derive(Debug, Clone, Deserialize)]
pub struct Manifest {
    pub name: String,
    #[serde(default)]
    pub steps: Vec<StepSpec>,
}

/// One scripted step.
#[derive(Debug, Clone, Deserialize)]
pub struct StepSpec {
    pub id: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub depends_on: Vec<String>,
    /// Output returned on success.
    #[serde(default)]
    pub output: Value,
    #[serde(default)]
    pub fail: Option<FailureSpec>,
    /// Register a compensation action for this step.
    #[serde(default)]
    pub compensate: bool,
    /// Make the compensation action fail with this message.
    #[serde(default)]
    pub compensation_error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Retryable,
    Fatal,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FailureSpec {
    pub kind: FailureKind,
    pub message: String,
    /// Only fail on the first `attempts` job attempts; always fail if unset.
    #[serde(default)]
    pub attempts: Option<u32>,
}

impl Manifest {
    pub fn load(path: &Path) -> Result<Self, ManifestError> {
        let content = std::fs::read_to_string(path).map_err(|source| ManifestError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, ManifestError> {
        Ok(serde_json::from_str(content)?)
    }

    /// Build a workflow whose shared state starts as an empty JSON object.
    pub fn to_workflow(&self, metrics: Arc<dyn MetricsSink>) -> Workflow<Value, Value> {
        let steps = self.steps.iter().map(|spec| {
            let script = ScriptedStep::from(spec);
            let mut step: StepDefinition<Value, Value> = StepDefinition::new(spec.id.clone(), script.clone())
                .depends_on(spec.depends_on.iter().cloned());
            if let Some(description) = &spec.description {
                step = step.with_description(description.clone());
            }
            if spec.compensate {
                step = step.with_compensation(script);
            }
            step
        });

        Workflow::builder_with_state(self.name.clone(), || json!({}))
            .steps(steps)
            .observer(Arc::new(TracingObserver))
            .metrics(metrics)
            .build()
    }
}

#[derive(Debug, Clone)]
struct ScriptedStep {
    id: String,
    output: Value,
    fail: Option<FailureSpec>,
    compensation_error: Option<String>,
}

impl From<&StepSpec> for ScriptedStep {
    fn from(spec: &StepSpec) -> Self {
        Self {
            id: spec.id.clone(),
            output: spec.output.clone(),
            fail: spec.fail.clone(),
            compensation_error: spec.compensation_error.clone(),
        }
    }
}

#[async_trait]
impl ExecuteStep<Value, Value> for ScriptedStep {
    async fn execute(&self, args: StepArgs<'_, Value, Value>) -> Result<Value, StepError> {
        if let Some(fail) = &self.fail {
            let applies = fail.attempts.map_or(true, |n| args.job.attempt <= n);
            if applies {
                return Err(match fail.kind {
                    FailureKind::Retryable => StepError::Retryable(fail.message.clone()),
                    FailureKind::Fatal => StepError::Fatal(fail.message.clone()),
                });
            }
        }

        debug!("scripted step '{}' writing its output to shared state", self.id);
        args.shared_state[self.id.as_str()] = self.output.clone();
        Ok(self.output.clone())
    }
}

#[async_trait]
impl CompensateStep<Value, Value> for ScriptedStep {
    async fn compensate(&self, args: CompensationArgs<'_, Value, Value>) -> Result<(), StepError> {
        if let Some(message) = &self.compensation_error {
            return Err(StepError::Fatal(message.clone()));
        }
        if let Some(state) = args.shared_state.as_object_mut() {
            state.remove(&self.id);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use engine::{ConfigError, InMemoryMetrics, NoopMetrics, StepStatus};
    use queue::{JobError, JobRunner, RetryPolicy};
    use std::time::Duration;

    const ORDER: &str = r#"{
        "name": "order",
        "steps": [
            { "id": "reserve", "output": { "sku": "A-1" }, "compensate": true },
            { "id": "charge", "depends_on": ["reserve"], "output": { "paid": 20 }, "compensate": true,
              "fail": { "kind": "retryable", "message": "gateway timeout", "attempts": 1 } },
            { "id": "ship", "depends_on": ["charge"], "output": { "carrier": "dhl" } }
        ]
    }"#;

    fn runner() -> JobRunner {
        JobRunner::new(RetryPolicy { max_attempts: 3, base_delay: Duration::from_millis(10) })
    }

    #[test]
    fn parses_defaults() {
        let manifest = Manifest::parse(ORDER).unwrap();
        assert_eq!(manifest.steps.len(), 3);
        assert!(manifest.steps[0].depends_on.is_empty());
        assert!(manifest.steps[0].fail.is_none());
        assert!(!manifest.steps[2].compensate);
        assert_eq!(manifest.steps[1].fail.as_ref().unwrap().kind, FailureKind::Retryable);
    }

    #[test]
    fn rejects_unknown_failure_kind() {
        let err = Manifest::parse(
            r#"{ "name": "x", "steps": [{ "id": "a", "fail": { "kind": "sometimes", "message": "m" } }] }"#,
        )
        .unwrap_err();
        assert!(matches!(err, ManifestError::Parse(_)));
    }

    #[test]
    fn misordered_dependencies_fail_validation() {
        let manifest = Manifest::parse(
            r#"{ "name": "x", "steps": [{ "id": "b", "depends_on": ["a"] }, { "id": "a" }] }"#,
        )
        .unwrap();
        let wf = manifest.to_workflow(Arc::new(NoopMetrics));
        assert!(matches!(wf.validate(), Err(ConfigError::UnknownDependency { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn scripted_retry_succeeds_on_second_attempt() {
        let metrics = Arc::new(InMemoryMetrics::new());
        let wf = Manifest::parse(ORDER).unwrap().to_workflow(metrics.clone());

        let success = runner().run(&wf, &json!({})).await.unwrap();

        assert_eq!(
            success.shared_state,
            json!({ "reserve": { "sku": "A-1" }, "charge": { "paid": 20 }, "ship": { "carrier": "dhl" } })
        );
        assert_eq!(success.result, json!({ "carrier": "dhl" }));
        // First attempt: reserve compensated after charge failed.
        assert_eq!(metrics.compensations(), vec!["reserve".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn fatal_failure_unwinds_shared_state() {
        let manifest = Manifest::parse(
            r#"{ "name": "order", "steps": [
                { "id": "reserve", "output": 1, "compensate": true },
                { "id": "charge", "output": 2, "compensate": true },
                { "id": "ship", "fail": { "kind": "fatal", "message": "no carrier" } }
            ] }"#,
        )
        .unwrap();
        let wf = manifest.to_workflow(Arc::new(NoopMetrics));

        let report = wf
            .execute_with_report(&json!({}), &steps::JobContext::new("order"))
            .await
            .unwrap();

        assert_eq!(report.shared_state(), &json!({}));
        let statuses: Vec<_> = report.steps().iter().map(|s| s.status).collect();
        assert_eq!(
            statuses,
            vec![StepStatus::Compensated, StepStatus::Compensated, StepStatus::Failed]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn failing_compensation_is_reported_by_the_runner() {
        let manifest = Manifest::parse(
            r#"{ "name": "order", "steps": [
                { "id": "reserve", "output": "held", "compensate": true, "compensation_error": "warehouse offline" },
                { "id": "charge", "fail": { "kind": "fatal", "message": "declined" } }
            ] }"#,
        )
        .unwrap();
        let wf = manifest.to_workflow(Arc::new(NoopMetrics));

        let err = runner().run(&wf, &json!({})).await.unwrap_err();

        match err {
            JobError::Failed { attempts, error, shared_state, .. } => {
                assert_eq!(attempts, 1);
                assert_eq!(error.step_id(), Some("reserve"));
                // The failed compensation left its write behind.
                assert_eq!(shared_state, json!({ "reserve": "held" }));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
