//! `steps` crate — the step contract every saga step implements.
//!
//! A step is a pair of capabilities: [`ExecuteStep`] (required) and
//! [`CompensateStep`] (optional).  The engine crate stores them as trait
//! objects inside its step definitions and dispatches through them.

pub mod context;
pub mod error;
pub mod traits;
pub mod mock;

pub use context::JobContext;
pub use error::StepError;
pub use traits::{CompensateStep, CompensationArgs, ExecuteStep, StepArgs, StepResults};
