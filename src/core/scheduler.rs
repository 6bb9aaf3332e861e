// Local runner: walks a job tree, parents before children

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use crate::core::executor::JobExecutor;
use crate::core::graph::{JobGraph, JobNodeId};
use crate::core::jobstore::{CompletionRecord, JobStore};
use crate::error::JobError;
use crate::jobs::JobSpec;
use crate::types::JobName;

#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Cores shared by all concurrently running jobs.
    pub max_cores: usize,
    /// Extra attempts after a job's first failure.
    pub retry_count: u32,
    /// Directory receiving one `<job>.log` per job.
    pub write_logs: Option<PathBuf>,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            max_cores: 1,
            retry_count: 1,
            write_logs: None,
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct RunSummary {
    pub completed: Vec<JobName>,
    /// Jobs already finished by an earlier run of the same job store.
    pub skipped: Vec<JobName>,
    pub failed: Vec<JobName>,
    /// Descendants of failed jobs, never started.
    pub not_run: usize,
}

impl RunSummary {
    pub fn succeeded(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn ensure_success(&self) -> Result<()> {
        if self.succeeded() {
            return Ok(());
        }
        let names: Vec<_> = self.failed.iter().map(JobName::as_str).collect();
        bail!(
            "{} job(s) failed: {} ({} downstream job(s) not run)",
            self.failed.len(),
            names.join(", "),
            self.not_run
        )
    }
}

enum JobOutcome {
    Completed,
    Skipped,
    Failed(JobError),
}

pub struct LocalRunner {
    executor: Arc<dyn JobExecutor>,
    store: Arc<JobStore>,
    config: RunnerConfig,
    cores: Arc<Semaphore>,
}

impl LocalRunner {
    pub fn new(executor: Arc<dyn JobExecutor>, store: Arc<JobStore>, config: RunnerConfig) -> Self {
        let cores = Arc::new(Semaphore::new(config.max_cores.max(1)));
        Self {
            executor,
            store,
            config,
            cores,
        }
    }

    /// Run every job of `graph` that the store has not already completed.
    ///
    /// Children of a job start once it has completed (or was skipped);
    /// siblings run concurrently within the core budget.
    pub async fn run(&self, graph: &JobGraph) -> Result<RunSummary> {
        let graph = Arc::new(graph.clone());
        let mut summary = RunSummary::default();
        let mut tasks = JoinSet::new();

        info!(
            "Running {} jobs for workflow {} with {} cores",
            graph.len(),
            self.store.workflow_id(),
            self.config.max_cores
        );
        self.spawn(&mut tasks, &graph, graph.root());

        while let Some(joined) = tasks.join_next().await {
            let (id, outcome) = joined.context("job task panicked")?;
            let name = graph
                .get(id)
                .map(|spec| spec.name.clone())
                .context("finished job is not in the graph")?;

            match outcome {
                JobOutcome::Completed => summary.completed.push(name),
                JobOutcome::Skipped => summary.skipped.push(name),
                JobOutcome::Failed(err) => {
                    let downstream = graph.descendant_count(id);
                    error!("{}; {} downstream job(s) will not run", err, downstream);
                    summary.not_run += downstream;
                    summary.failed.push(name);
                    continue;
                }
            }

            for &child in graph.children(id) {
                self.spawn(&mut tasks, &graph, child);
            }
        }

        info!(
            "Run finished: {} completed, {} skipped, {} failed",
            summary.completed.len(),
            summary.skipped.len(),
            summary.failed.len()
        );
        Ok(summary)
    }

    fn spawn(
        &self,
        tasks: &mut JoinSet<(JobNodeId, JobOutcome)>,
        graph: &Arc<JobGraph>,
        id: JobNodeId,
    ) {
        let Some(spec) = graph.get(id).cloned() else {
            return;
        };
        let executor = self.executor.clone();
        let store = self.store.clone();
        let cores = self.cores.clone();
        let config = self.config.clone();

        tasks.spawn(async move {
            let outcome = run_job(&spec, executor.as_ref(), &store, &cores, &config).await;
            (id, outcome)
        });
    }
}

async fn run_job(
    spec: &JobSpec,
    executor: &dyn JobExecutor,
    store: &JobStore,
    cores: &Arc<Semaphore>,
    config: &RunnerConfig,
) -> JobOutcome {
    if store.is_completed(&spec.name) {
        info!("Job {} already completed; skipping", spec.name);
        return JobOutcome::Skipped;
    }

    let Some(invocation) = &spec.command else {
        return record(store, CompletionRecord::now(spec.name.clone(), 1, None));
    };

    let budget = u32::try_from(config.max_cores.max(1)).unwrap_or(u32::MAX);
    let wanted = spec.resources.cores.clamp(1, budget);
    let _permit = match cores.clone().acquire_many_owned(wanted).await {
        Ok(permit) => permit,
        Err(e) => {
            return JobOutcome::Failed(JobError::Io {
                job: spec.name.clone(),
                source: std::io::Error::other(e),
            });
        }
    };

    let log = config
        .write_logs
        .as_ref()
        .map(|dir| dir.join(format!("{}.log", spec.name.as_str().replace('/', "__"))));
    let attempts = 1 + config.retry_count;

    info!(
        "Starting job {} ({} cores, {} memory)",
        spec.name, spec.resources.cores, spec.resources.memory
    );
    let mut attempt = 1;
    loop {
        match executor.execute(&spec.name, invocation, log.as_deref()).await {
            Ok(output) => {
                info!("Job {} finished in {:.1?}", spec.name, output.duration);
                return record(
                    store,
                    CompletionRecord::now(spec.name.clone(), attempt, output.exit_code),
                );
            }
            Err(err) if attempt < attempts => {
                warn!("{} (attempt {}/{}); retrying", err, attempt, attempts);
                attempt += 1;
            }
            Err(err) => return JobOutcome::Failed(err),
        }
    }
}

fn record(store: &JobStore, record: CompletionRecord) -> JobOutcome {
    match store.mark_completed(&record) {
        Ok(()) => JobOutcome::Completed,
        Err(e) => JobOutcome::Failed(JobError::Io {
            job: record.job,
            source: std::io::Error::other(format!("{e:#}")),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::executor::ExecutionOutput;
    use crate::jobs::{Invocation, Resources};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::path::Path;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;
    use tempfile::TempDir;

    /// Records the order jobs ran in; fails a job a configured number of times.
    #[derive(Default)]
    struct ScriptedExecutor {
        ran: Mutex<Vec<String>>,
        failures: Mutex<HashMap<String, u32>>,
    }

    impl ScriptedExecutor {
        fn failing(job: &str, times: u32) -> Self {
            let exec = Self::default();
            exec.failures.lock().unwrap().insert(job.to_string(), times);
            exec
        }

        fn ran(&self) -> Vec<String> {
            self.ran.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl JobExecutor for ScriptedExecutor {
        async fn execute(
            &self,
            job: &JobName,
            _invocation: &Invocation,
            _log: Option<&Path>,
        ) -> Result<ExecutionOutput, JobError> {
            self.ran.lock().unwrap().push(job.to_string());
            let mut failures = self.failures.lock().unwrap();
            if let Some(left) = failures.get_mut(job.as_str()) {
                if *left > 0 {
                    *left -= 1;
                    return Err(JobError::Failed {
                        job: job.clone(),
                        code: 1,
                    });
                }
            }
            Ok(ExecutionOutput {
                job: job.clone(),
                exit_code: Some(0),
                tolerated_failure: false,
                duration: Duration::ZERO,
            })
        }
    }

    fn spec(name: &str, cores: u32) -> JobSpec {
        JobSpec {
            name: JobName::new(name),
            resources: Resources::new(cores, "1G"),
            command: Some(Invocation::new("true", "/tmp")),
        }
    }

    /// start -> {a -> {a1, a2}, b}
    fn tree() -> JobGraph {
        let mut graph = JobGraph::new(JobSpec {
            name: JobName::new("start"),
            resources: Resources::default(),
            command: None,
        });
        let a = graph.add_child(graph.root(), spec("a", 8)).unwrap();
        graph.add_child(a, spec("a1", 8)).unwrap();
        graph.add_child(a, spec("a2", 1)).unwrap();
        graph.add_child(graph.root(), spec("b", 1)).unwrap();
        graph
    }

    fn runner(dir: &TempDir, exec: Arc<ScriptedExecutor>, retry_count: u32) -> LocalRunner {
        let store = JobStore::open(dir.path().join("store"))
            .or_else(|_| JobStore::create(dir.path().join("store")))
            .unwrap();
        LocalRunner::new(
            exec,
            Arc::new(store),
            RunnerConfig {
                max_cores: 4,
                retry_count,
                write_logs: None,
            },
        )
    }

    #[tokio::test]
    async fn test_parents_run_before_children() {
        let dir = TempDir::new().unwrap();
        let exec = Arc::new(ScriptedExecutor::default());
        let summary = runner(&dir, exec.clone(), 0).run(&tree()).await.unwrap();

        assert!(summary.succeeded());
        assert_eq!(summary.completed.len(), 5);

        let ran = exec.ran();
        let pos = |n: &str| ran.iter().position(|r| r == n).unwrap();
        assert!(pos("a") < pos("a1"));
        assert!(pos("a") < pos("a2"));
        assert_eq!(ran.len(), 4);
    }

    #[tokio::test]
    async fn test_retry_then_succeed() {
        let dir = TempDir::new().unwrap();
        let exec = Arc::new(ScriptedExecutor::failing("b", 1));
        let summary = runner(&dir, exec.clone(), 1).run(&tree()).await.unwrap();

        assert!(summary.succeeded());
        assert_eq!(exec.ran().iter().filter(|r| *r == "b").count(), 2);
    }

    #[tokio::test]
    async fn test_failure_prunes_subtree() {
        let dir = TempDir::new().unwrap();
        let exec = Arc::new(ScriptedExecutor::failing("a", 5));
        let summary = runner(&dir, exec.clone(), 1).run(&tree()).await.unwrap();

        assert_eq!(summary.failed, vec![JobName::new("a")]);
        assert_eq!(summary.not_run, 2);
        assert!(!exec.ran().contains(&"a1".to_string()));
        assert!(exec.ran().contains(&"b".to_string()));

        let err = summary.ensure_success().unwrap_err().to_string();
        assert!(err.contains("1 job(s) failed: a"));
    }

    #[tokio::test]
    async fn test_restart_skips_completed_jobs() {
        let dir = TempDir::new().unwrap();
        let first = Arc::new(ScriptedExecutor::failing("a", 5));
        let summary = runner(&dir, first, 0).run(&tree()).await.unwrap();
        assert!(!summary.succeeded());

        let second = Arc::new(ScriptedExecutor::default());
        let summary = runner(&dir, second.clone(), 0).run(&tree()).await.unwrap();

        assert!(summary.succeeded());
        let mut skipped: Vec<_> = summary.skipped.iter().map(|n| n.to_string()).collect();
        skipped.sort();
        assert_eq!(skipped, vec!["b", "start"]);

        let mut ran = second.ran();
        ran.sort();
        assert_eq!(ran, vec!["a", "a1", "a2"]);
    }

    /// Sleeps while holding its job's declared cores and records the peak in flight.
    struct CoreTrackingExecutor {
        cores: HashMap<String, u32>,
        in_flight: AtomicU32,
        peak: AtomicU32,
    }

    #[async_trait]
    impl JobExecutor for CoreTrackingExecutor {
        async fn execute(
            &self,
            job: &JobName,
            _invocation: &Invocation,
            _log: Option<&Path>,
        ) -> Result<ExecutionOutput, JobError> {
            let cores = self.cores[job.as_str()];
            let now = self.in_flight.fetch_add(cores, Ordering::SeqCst) + cores;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(50)).await;
            self.in_flight.fetch_sub(cores, Ordering::SeqCst);

            Ok(ExecutionOutput {
                job: job.clone(),
                exit_code: Some(0),
                tolerated_failure: false,
                duration: Duration::from_millis(50),
            })
        }
    }

    #[tokio::test]
    async fn test_core_budget_bounds_concurrent_jobs() {
        let dir = TempDir::new().unwrap();
        let mut graph = JobGraph::new(JobSpec {
            name: JobName::new("start"),
            resources: Resources::default(),
            command: None,
        });
        let jobs = [("x", 8), ("y", 8), ("z", 1), ("w", 1)];
        for (name, cores) in jobs {
            graph.add_child(graph.root(), spec(name, cores)).unwrap();
        }

        let exec = Arc::new(CoreTrackingExecutor {
            cores: jobs.iter().map(|(n, c)| (n.to_string(), *c)).collect(),
            in_flight: AtomicU32::new(0),
            peak: AtomicU32::new(0),
        });
        let store = JobStore::create(dir.path().join("store")).unwrap();
        let runner = LocalRunner::new(
            exec.clone(),
            Arc::new(store),
            RunnerConfig {
                max_cores: 8,
                retry_count: 0,
                write_logs: None,
            },
        );

        let summary = runner.run(&graph).await.unwrap();
        assert!(summary.succeeded());

        let peak = exec.peak.load(Ordering::SeqCst);
        assert!(peak <= 8, "peak cores in flight was {peak}");
        assert_eq!(exec.in_flight.load(Ordering::SeqCst), 0);
    }

    #[cfg(target_pointer_width = "64")]
    #[tokio::test]
    async fn test_core_budget_beyond_u32_does_not_panic() {
        let dir = TempDir::new().unwrap();
        let exec = Arc::new(ScriptedExecutor::default());
        let store = JobStore::create(dir.path().join("store")).unwrap();
        let runner = LocalRunner::new(
            exec,
            Arc::new(store),
            RunnerConfig {
                max_cores: u32::MAX as usize + 1,
                retry_count: 0,
                write_logs: None,
            },
        );

        let summary = runner.run(&tree()).await.unwrap();
        assert!(summary.succeeded());
    }
}
