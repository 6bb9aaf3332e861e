//! Job definitions for the HLA tools.
//!
//! Each tool is a small builder implementing [`ToolJob`]; building one does
//! the directory bookkeeping for its tool and the result is flattened into a
//! serialisable [`JobSpec`] that the graph and job store carry around.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::constants::DEFAULT_RUNTIME_MINUTES;
use crate::types::JobName;

mod arcashla;
mod hlascan;
mod lilac;
mod seq2hla;
mod start;

pub use arcashla::{ArcasHlaExtractJob, ArcasHlaGenotypeJob};
pub use hlascan::HlascanJob;
pub use lilac::LilacJob;
pub use seq2hla::Seq2HlaJob;
pub use start::StartJob;

/// Resource request of a job.
///
/// The local runner only enforces `cores`; memory and runtime are recorded
/// for logs and for batch systems that understand them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resources {
    pub cores: u32,
    pub memory: String,
    pub runtime_minutes: u32,
}

impl Default for Resources {
    fn default() -> Self {
        Self {
            cores: 1,
            memory: "5G".to_string(),
            runtime_minutes: DEFAULT_RUNTIME_MINUTES,
        }
    }
}

impl Resources {
    pub fn new(cores: u32, memory: impl Into<String>) -> Self {
        Self {
            cores,
            memory: memory.into(),
            ..Default::default()
        }
    }
}

/// A single external command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    /// Working directory of the process.
    pub cwd: PathBuf,
    /// Output directory created just before the process starts.
    pub workdir: PathBuf,
    /// File receiving the process's stdout, if it is captured.
    pub stdout: Option<PathBuf>,
    /// Treat a non-zero exit status as success.
    pub tolerate_failure: bool,
    /// Whether the configured container runtime wraps this command.
    pub containerized: bool,
}

impl Invocation {
    pub fn new(program: impl Into<String>, cwd: impl Into<PathBuf>) -> Self {
        let cwd = cwd.into();
        Self {
            program: program.into(),
            args: Vec::new(),
            workdir: cwd.clone(),
            cwd,
            stdout: None,
            tolerate_failure: false,
            containerized: true,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn path_arg(self, path: &std::path::Path) -> Self {
        self.arg(path.display().to_string())
    }

    pub fn workdir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.workdir = dir.into();
        self
    }

    pub fn stdout_to(mut self, path: impl Into<PathBuf>) -> Self {
        self.stdout = Some(path.into());
        self
    }

    pub fn tolerate_failure(mut self) -> Self {
        self.tolerate_failure = true;
        self
    }

    pub fn uncontainerized(mut self) -> Self {
        self.containerized = false;
        self
    }

    /// Program followed by its arguments.
    pub fn argv(&self) -> Vec<String> {
        std::iter::once(self.program.clone())
            .chain(self.args.iter().cloned())
            .collect()
    }
}

/// Flattened, serialisable description of one node of the job graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSpec {
    pub name: JobName,
    pub resources: Resources,
    /// `None` for jobs that only group their children.
    pub command: Option<Invocation>,
}

/// Trait implemented by every job builder.
pub trait ToolJob {
    /// Unique, restart-stable name of this job.
    fn name(&self) -> JobName;

    fn resources(&self) -> Resources {
        Resources::default()
    }

    /// The command to run, if any.
    fn invocation(&self) -> Option<Invocation>;

    /// Flatten into a [`JobSpec`] for the graph.
    fn to_spec(&self) -> JobSpec {
        JobSpec {
            name: self.name(),
            resources: self.resources(),
            command: self.invocation(),
        }
    }
}

/// Create `dir` and its parents if missing.
pub(crate) fn ensure_dir(dir: &std::path::Path) -> std::io::Result<()> {
    if !dir.is_dir() {
        std::fs::create_dir_all(dir)?;
    }
    Ok(())
}
