//! `engine` crate — saga orchestration: step validation, sequential
//! execution, reverse-order compensation, lifecycle events and metrics.

pub mod models;
pub mod error;
pub mod validation;
pub mod state;
pub mod events;
pub mod metrics;
pub mod result;
mod executor;
mod compensator;
pub mod orchestrator;

pub use models::{StepDefinition, StepSnapshot, StepStatus};
pub use error::{ConfigError, WorkflowError};
pub use validation::validate_steps;
pub use state::RuntimeState;
pub use events::{EventEmitter, EventKind, TracingObserver, WorkflowEvent, WorkflowObserver};
pub use metrics::{InMemoryMetrics, MetricRecord, MetricsSink, NoopMetrics, Outcome, TracingMetrics};
pub use result::{WorkflowFailure, WorkflowResult, WorkflowSuccess};
pub use orchestrator::{Workflow, WorkflowBuilder};
