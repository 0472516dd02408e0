//! The execution context handed to a workflow by its job host.

use tracing::Span;
use uuid::Uuid;

/// Per-attempt context supplied by whatever runs the workflow.
///
/// Defined here (in the steps crate) so both the engine and individual step
/// implementations can import it without a circular dependency.
#[derive(Debug, Clone)]
pub struct JobContext {
    /// Name of the job, for the host's logs. Metrics are labelled with the
    /// workflow's own name.
    pub job_name: String,
    /// Correlates every attempt of one logical job.
    pub correlation_id: Uuid,
    /// 1-based attempt counter.
    pub attempt: u32,
    /// Attempts the host will make before giving up.
    pub max_attempts: u32,
    /// Span that step code logs under.
    pub span: Span,
}

impl JobContext {
    /// A first-attempt context with a fresh correlation id.
    pub fn new(job_name: impl Into<String>) -> Self {
        Self {
            job_name: job_name.into(),
            correlation_id: Uuid::new_v4(),
            attempt: 1,
            max_attempts: 1,
            span: Span::none(),
        }
    }

    pub fn with_correlation_id(mut self, correlation_id: Uuid) -> Self {
        self.correlation_id = correlation_id;
        self
    }

    pub fn with_attempt(mut self, attempt: u32, max_attempts: u32) -> Self {
        self.attempt = attempt;
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// True when the host will not retry after this attempt.
    pub fn is_last_attempt(&self) -> bool {
        self.attempt >= self.max_attempts
    }
}
