//! Error types for input validation and job execution.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::types::JobName;

/// Errors raised while validating pipeline inputs.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// An input file does not exist.
    #[error("{} should exist.", .0.display())]
    MissingFile(PathBuf),

    /// The index (`.bai` / `.fai`) next to an input does not exist.
    #[error("{} should exist.", .0.display())]
    MissingIndex(PathBuf),

    #[error("{} is not a file.", .0.display())]
    NotAFile(PathBuf),

    #[error("{} is an empty file.", .0.display())]
    EmptyFile(PathBuf),

    #[error("{} is not a directory.", .0.display())]
    NotADirectory(PathBuf),

    /// A tool flag was given without the flag it depends on.
    #[error("--{flag} requires --{requires}")]
    MissingDependency {
        flag: &'static str,
        requires: &'static str,
    },

    /// A sample ID that cannot name an output directory or job.
    #[error("invalid sample id `{0}`: must be non-empty and contain no `/`")]
    InvalidSampleId(String),
}

/// Errors raised while running a single job.
#[derive(Debug, Error)]
pub enum JobError {
    /// The process could not be started at all.
    #[error("job {job}: failed to spawn `{program}`: {source}")]
    Spawn {
        job: JobName,
        program: String,
        #[source]
        source: io::Error,
    },

    /// The process exited with a non-zero status.
    #[error("job {job}: exited with status {code}")]
    Failed { job: JobName, code: i32 },

    /// The process was killed by a signal.
    #[error("job {job}: terminated by signal")]
    Signalled { job: JobName },

    /// Preparing directories or log files failed.
    #[error("job {job}: {source}")]
    Io {
        job: JobName,
        #[source]
        source: io::Error,
    },
}

impl JobError {
    /// Name of the job that failed.
    pub fn job(&self) -> &JobName {
        match self {
            Self::Spawn { job, .. }
            | Self::Failed { job, .. }
            | Self::Signalled { job }
            | Self::Io { job, .. } => job,
        }
    }
}
