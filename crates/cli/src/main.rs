//! `saga-runner` CLI entry-point.
//!
//! Available sub-commands:
//! - `validate` — check a workflow manifest's step list.
//! - `run`      — dry-run a manifest's scripted steps through the job runner.

mod manifest;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use engine::InMemoryMetrics;
use queue::{JobError, JobRunner, RetryPolicy};
use serde_json::{json, Value};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::manifest::Manifest;

#[derive(Parser)]
#[command(
    name = "saga-runner",
    about = "Sequential saga orchestration with reverse-order compensation",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Validate a workflow manifest.
    Validate {
        /// Path to the manifest JSON file.
        path: PathBuf,
    },
    /// Run a manifest's scripted steps and print the outcome as JSON.
    Run {
        /// Path to the manifest JSON file.
        path: PathBuf,
        /// Job payload (JSON).
        #[arg(long, default_value = "{}")]
        payload: String,
        /// Attempts the job runner makes before giving up.
        #[arg(long, env = "SAGA_MAX_ATTEMPTS", default_value_t = 3)]
        max_attempts: u32,
        /// Base delay for exponential back-off between attempts.
        #[arg(long, env = "SAGA_RETRY_BASE_DELAY_MS", default_value_t = 100)]
        retry_base_delay_ms: u64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Validate { path } => {
            let manifest = Manifest::load(&path)?;
            let workflow = manifest.to_workflow(Arc::new(engine::NoopMetrics));

            match workflow.validate() {
                Ok(()) => {
                    let order: Vec<&str> = workflow.steps().iter().map(|s| s.id()).collect();
                    println!("✅ Workflow is valid. Step order: {order:?}");
                    Ok(ExitCode::SUCCESS)
                }
                Err(e) => {
                    eprintln!("❌ Validation failed: {e}");
                    Ok(ExitCode::FAILURE)
                }
            }
        }

        Command::Run { path, payload, max_attempts, retry_base_delay_ms } => {
            let manifest = Manifest::load(&path)?;
            let payload: Value =
                serde_json::from_str(&payload).context("--payload is not valid JSON")?;

            let metrics = Arc::new(InMemoryMetrics::new());
            let workflow = manifest.to_workflow(metrics.clone());
            let runner = JobRunner::new(RetryPolicy {
                max_attempts,
                base_delay: Duration::from_millis(retry_base_delay_ms),
            });

            info!("Running workflow '{}' ({} steps)", manifest.name, manifest.steps.len());

            let (mut report, code) = match runner.run(&workflow, &payload).await {
                Ok(success) => {
                    let mut report = serde_json::to_value(&success)?;
                    report["status"] = json!("success");
                    (report, ExitCode::SUCCESS)
                }
                Err(JobError::Failed { attempts, error, shared_state, step_results, steps }) => (
                    json!({
                        "status": "failure",
                        "attempts": attempts,
                        "error": error.to_string(),
                        "sharedState": shared_state,
                        "stepResults": step_results,
                        "steps": steps,
                    }),
                    ExitCode::FAILURE,
                ),
                Err(config @ JobError::Config(_)) => {
                    eprintln!("❌ {config}");
                    return Ok(ExitCode::FAILURE);
                }
            };

            report["metrics"] = serde_json::to_value(metrics.records())?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(code)
        }
    }
}
