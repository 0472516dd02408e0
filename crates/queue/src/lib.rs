//! `queue` crate — a minimal in-process job host.
//!
//! The engine runs one execution per call and never retries.  `JobRunner`
//! is the host around it: it hands every attempt a fresh [`JobContext`],
//! re-runs the workflow from the first step while the failure is
//! retryable, and backs off exponentially between attempts.

pub mod error;
pub mod runner;

pub use error::JobError;
pub use runner::{JobRunner, RetryPolicy};
