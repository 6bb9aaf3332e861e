// Job execution engine

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::str::FromStr;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::error::JobError;
use crate::jobs::{ensure_dir, Invocation};
use crate::types::JobName;

#[async_trait]
pub trait JobExecutor: Send + Sync {
    /// Run one invocation to completion. `log`, when set, receives stderr
    /// (and stdout unless the invocation captures it elsewhere).
    async fn execute(
        &self,
        job: &JobName,
        invocation: &Invocation,
        log: Option<&Path>,
    ) -> Result<ExecutionOutput, JobError>;
}

#[derive(Debug, Clone)]
pub struct ExecutionOutput {
    pub job: JobName,
    pub exit_code: Option<i32>,
    /// The process failed but the invocation tolerates failure.
    pub tolerated_failure: bool,
    pub duration: Duration,
}

/// A `SRC:DST` bind mount for container runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Volume {
    pub src: PathBuf,
    pub dst: PathBuf,
}

impl FromStr for Volume {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once(':') {
            Some((src, dst)) if !src.is_empty() && !dst.is_empty() => Ok(Volume {
                src: PathBuf::from(src),
                dst: PathBuf::from(dst),
            }),
            _ => Err(format!("volume `{s}` must be SRC:DST")),
        }
    }
}

impl Volume {
    fn spec(&self) -> String {
        format!("{}:{}", self.src.display(), self.dst.display())
    }
}

/// How containerised invocations are launched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ContainerRuntime {
    /// Run the program directly on the host.
    #[default]
    Local,
    Docker {
        image: String,
        volumes: Vec<Volume>,
    },
    Singularity {
        image: String,
        volumes: Vec<Volume>,
    },
}

impl ContainerRuntime {
    /// Full argv for `invocation` under this runtime.
    pub fn wrap(&self, invocation: &Invocation) -> Vec<String> {
        let argv = invocation.argv();
        if !invocation.containerized {
            return argv;
        }

        let cwd = invocation.cwd.display().to_string();
        match self {
            Self::Local => argv,
            Self::Docker { image, volumes } => {
                let mut out = vec![
                    "docker".to_string(),
                    "run".into(),
                    "--rm".into(),
                    "--workdir".into(),
                    cwd.clone(),
                    "-v".into(),
                    format!("{cwd}:{cwd}"),
                ];
                for v in volumes {
                    out.push("-v".into());
                    out.push(v.spec());
                }
                out.push(image.clone());
                out.extend(argv);
                out
            }
            Self::Singularity { image, volumes } => {
                let mut out = vec![
                    "singularity".to_string(),
                    "exec".into(),
                    "--pwd".into(),
                    cwd,
                ];
                for v in volumes {
                    out.push("-B".into());
                    out.push(v.spec());
                }
                out.push(image.clone());
                out.extend(argv);
                out
            }
        }
    }
}

/// Runs invocations as child processes via `tokio::process`.
#[derive(Debug, Clone, Default)]
pub struct ProcessExecutor {
    container: ContainerRuntime,
}

impl ProcessExecutor {
    pub fn new(container: ContainerRuntime) -> Self {
        Self { container }
    }
}

fn open_append(path: &Path) -> std::io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}

#[async_trait]
impl JobExecutor for ProcessExecutor {
    async fn execute(
        &self,
        job: &JobName,
        invocation: &Invocation,
        log: Option<&Path>,
    ) -> Result<ExecutionOutput, JobError> {
        let io_err = |source: std::io::Error| JobError::Io {
            job: job.clone(),
            source,
        };

        ensure_dir(&invocation.workdir).map_err(io_err)?;
        ensure_dir(&invocation.cwd).map_err(io_err)?;

        let argv = self.container.wrap(invocation);
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| io_err(std::io::Error::other("empty command")))?;
        debug!("job {} running: {}", job, argv.join(" "));

        let mut cmd = Command::new(program);
        cmd.args(args).current_dir(&invocation.cwd).stdin(Stdio::null());

        let log_file = log.map(open_append).transpose().map_err(io_err)?;
        match (&invocation.stdout, &log_file) {
            (Some(path), _) => {
                cmd.stdout(File::create(path).map_err(io_err)?);
            }
            (None, Some(file)) => {
                cmd.stdout(file.try_clone().map_err(io_err)?);
            }
            (None, None) => {}
        }
        if let Some(file) = log_file {
            cmd.stderr(file);
        }

        let start = Instant::now();
        let status = cmd
            .status()
            .await
            .map_err(|source| JobError::Spawn {
                job: job.clone(),
                program: program.clone(),
                source,
            })?;
        let duration = start.elapsed();

        if status.success() {
            return Ok(ExecutionOutput {
                job: job.clone(),
                exit_code: status.code(),
                tolerated_failure: false,
                duration,
            });
        }

        if invocation.tolerate_failure {
            warn!("job {} exited with {}; ignoring", job, status);
            return Ok(ExecutionOutput {
                job: job.clone(),
                exit_code: status.code(),
                tolerated_failure: true,
                duration,
            });
        }

        match status.code() {
            Some(code) => Err(JobError::Failed {
                job: job.clone(),
                code,
            }),
            None => Err(JobError::Signalled { job: job.clone() }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sh(dir: &Path, script: &str) -> Invocation {
        Invocation::new("sh", dir).arg("-c").arg(script)
    }

    #[test]
    fn test_volume_parsing() {
        let v: Volume = "/refs:/mnt/refs".parse().unwrap();
        assert_eq!(v.src, PathBuf::from("/refs"));
        assert_eq!(v.dst, PathBuf::from("/mnt/refs"));
        assert!("/refs".parse::<Volume>().is_err());
        assert!(":/x".parse::<Volume>().is_err());
    }

    #[test]
    fn test_local_runtime_passes_argv_through() {
        let inv = Invocation::new("seq2hla", "/w").arg("-r").arg("R1");
        assert_eq!(ContainerRuntime::Local.wrap(&inv), vec!["seq2hla", "-r", "R1"]);
    }

    #[test]
    fn test_docker_wrap() {
        let inv = Invocation::new("arcasHLA", "/w").arg("extract");
        let rt = ContainerRuntime::Docker {
            image: "arcas:1.0".into(),
            volumes: vec!["/refs:/refs".parse().unwrap()],
        };
        assert_eq!(
            rt.wrap(&inv),
            vec![
                "docker", "run", "--rm", "--workdir", "/w", "-v", "/w:/w", "-v", "/refs:/refs",
                "arcas:1.0", "arcasHLA", "extract",
            ]
        );
    }

    #[test]
    fn test_singularity_wrap_skips_uncontainerized() {
        let rt = ContainerRuntime::Singularity {
            image: "tools.sif".into(),
            volumes: vec![],
        };
        let inv = Invocation::new("lilac", "/w");
        assert_eq!(rt.wrap(&inv), vec!["singularity", "exec", "--pwd", "/w", "tools.sif", "lilac"]);

        let inv = inv.uncontainerized();
        assert_eq!(rt.wrap(&inv), vec!["lilac"]);
    }

    #[tokio::test]
    async fn test_success_creates_workdir_and_logs() {
        let dir = TempDir::new().unwrap();
        let workdir = dir.path().join("out/sample");
        let log = dir.path().join("job.log");
        let inv = sh(dir.path(), "echo hello; echo oops >&2").workdir(&workdir);

        let out = ProcessExecutor::default()
            .execute(&JobName::new("j"), &inv, Some(&log))
            .await
            .unwrap();

        assert_eq!(out.exit_code, Some(0));
        assert!(!out.tolerated_failure);
        assert!(workdir.is_dir());
        let logged = std::fs::read_to_string(&log).unwrap();
        assert!(logged.contains("hello"));
        assert!(logged.contains("oops"));
    }

    #[tokio::test]
    async fn test_failure_is_reported() {
        let dir = TempDir::new().unwrap();
        let err = ProcessExecutor::default()
            .execute(&JobName::new("j"), &sh(dir.path(), "exit 3"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, JobError::Failed { code: 3, .. }));
    }

    #[tokio::test]
    async fn test_tolerated_failure_captures_stdout() {
        let dir = TempDir::new().unwrap();
        let report = dir.path().join("HLA-A.txt");
        let inv = sh(dir.path(), "echo partial; exit 1")
            .stdout_to(&report)
            .tolerate_failure();

        let out = ProcessExecutor::default()
            .execute(&JobName::new("j"), &inv, None)
            .await
            .unwrap();

        assert!(out.tolerated_failure);
        assert_eq!(out.exit_code, Some(1));
        assert_eq!(std::fs::read_to_string(&report).unwrap(), "partial\n");
    }

    #[tokio::test]
    async fn test_missing_program_fails_to_spawn() {
        let dir = TempDir::new().unwrap();
        let inv = Invocation::new("definitely-not-a-real-binary-xyz", dir.path());
        let err = ProcessExecutor::default()
            .execute(&JobName::new("j"), &inv, None)
            .await
            .unwrap_err();
        assert!(matches!(err, JobError::Spawn { .. }));
    }
}
