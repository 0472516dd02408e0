//! Job runner with retry and exponential back-off.

use std::time::Duration;

use engine::{Workflow, WorkflowResult, WorkflowSuccess};
use steps::JobContext;
use tracing::{info, info_span, warn};
use uuid::Uuid;

use crate::JobError;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Tuning knobs for the runner.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    /// Base delay for exponential back-off between attempts.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(100),
        }
    }
}

impl RetryPolicy {
    /// Delay to wait after the given (1-based) failed attempt.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.base_delay
            .checked_mul(2u32.saturating_pow(attempt.saturating_sub(1)))
            .unwrap_or(Duration::MAX)
    }
}

// ---------------------------------------------------------------------------
// JobRunner
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct JobRunner {
    policy: RetryPolicy,
}

impl JobRunner {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Run `workflow` as one job, retrying retryable failures.
    ///
    /// Every attempt starts from the first step with fresh runtime state;
    /// all attempts share one correlation id.
    ///
    /// # Errors
    /// [`JobError::Config`] for an invalid workflow (never retried), or
    /// [`JobError::Failed`] with the last attempt's error, shared state and
    /// snapshots.
    pub async fn run<P, S>(
        &self,
        workflow: &Workflow<P, S>,
        payload: &P,
    ) -> Result<WorkflowSuccess<S>, JobError<S>>
    where
        P: Send + Sync + 'static,
        S: Send + 'static,
    {
        let correlation_id = Uuid::new_v4();
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 1u32;

        loop {
            let span = info_span!(
                "job",
                job_name = %workflow.name(),
                %correlation_id,
                attempt
            );
            let job = JobContext::new(workflow.name())
                .with_correlation_id(correlation_id)
                .with_attempt(attempt, max_attempts)
                .with_span(span);

            match workflow.execute_with_report(payload, &job).await? {
                WorkflowResult::Success(success) => {
                    info!(
                        "job '{}' ({}) succeeded on attempt {}/{}",
                        workflow.name(), correlation_id, attempt, max_attempts
                    );
                    return Ok(success);
                }

                WorkflowResult::Failure(failure) => {
                    if !failure.error.is_retryable() || job.is_last_attempt() {
                        return Err(JobError::Failed {
                            attempts: attempt,
                            error: failure.error,
                            shared_state: failure.shared_state,
                            step_results: failure.step_results,
                            steps: failure.steps,
                        });
                    }

                    let delay = self.policy.delay_after(attempt);
                    warn!(
                        "job '{}' attempt {}/{} failed, retrying in {:?}: {}",
                        workflow.name(), attempt, max_attempts, delay, failure.error
                    );

                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}
