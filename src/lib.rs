// Core modules
mod config;
pub mod constants;
pub mod core;
pub mod error;
pub mod jobs;
pub mod options;
mod pipeline;
pub mod types;
pub mod validators;


// Re-export key types and functions
pub use config::{load_pipeline_config, resolve_config_path, PipelineFileConfig};
pub use crate::core::{
    ContainerRuntime, JobExecutor, JobGraph, JobStore, LocalRunner, ProcessExecutor, RunSummary,
    RunnerConfig, Volume,
};
pub use error::{JobError, ValidationError};
pub use options::{
    process_parsed_options, CleanPolicy, PipelineOptions, RawPipelineArgs, RunnerOptions,
};
pub use pipeline::Pipeline;

use std::sync::Arc;
use anyhow::Result;

/// Convenience function to validate options and run the pipeline with
/// processes launched on this host.
///
/// This processes the raw arguments, prepares the runner's log directory,
/// and starts (or restarts) the workflow in `runner.job_store`.
pub async fn run_pipeline(raw: RawPipelineArgs, mut runner: RunnerOptions) -> Result<RunSummary> {
    let options = process_parsed_options(raw)?;
    runner.prepare()?;

    let executor = Arc::new(ProcessExecutor::new(runner.container.clone()));
    let summary = Pipeline::new(options).run(&runner, executor).await?;
    summary.ensure_success()?;
    Ok(summary)
}
