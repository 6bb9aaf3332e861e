//! Directory-backed job store.
//!
//! Layout:
//!
//! ```text
//! <root>/workflow.json      workflow id and creation time
//! <root>/graph.json         the job graph as started
//! <root>/jobs/<name>.json   one completion record per finished job
//! ```
//!
//! A restart reloads `graph.json` and skips every job with a completion
//! record.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::core::graph::JobGraph;
use crate::types::{JobName, WorkflowId};

const WORKFLOW_FILE: &str = "workflow.json";
const GRAPH_FILE: &str = "graph.json";
const JOBS_DIR: &str = "jobs";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowRecord {
    pub workflow_id: WorkflowId,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionRecord {
    pub job: JobName,
    pub finished_at: DateTime<Utc>,
    pub attempts: u32,
    pub exit_code: Option<i32>,
}

impl CompletionRecord {
    pub fn now(job: JobName, attempts: u32, exit_code: Option<i32>) -> Self {
        Self {
            job,
            finished_at: Utc::now(),
            attempts,
            exit_code,
        }
    }
}

#[derive(Debug)]
pub struct JobStore {
    root: PathBuf,
    workflow: WorkflowRecord,
}

/// Job names contain `/`; flatten them into a single file name.
fn record_file_name(job: &JobName) -> String {
    format!("{}.json", job.as_str().replace('/', "__"))
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let tmp = path.with_extension("json.tmp");
    let raw = serde_json::to_vec_pretty(value)?;
    fs::write(&tmp, raw).with_context(|| format!("failed to write {}", tmp.display()))?;
    fs::rename(&tmp, path).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_slice(&raw).with_context(|| format!("malformed {}", path.display()))
}

impl JobStore {
    /// Create a fresh job store. Fails if `root` already exists.
    pub fn create(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        if root.exists() {
            bail!(
                "job store {} already exists; use --restart to resume it or remove it",
                root.display()
            );
        }

        fs::create_dir_all(root.join(JOBS_DIR))
            .with_context(|| format!("failed to create job store {}", root.display()))?;

        let workflow = WorkflowRecord {
            workflow_id: WorkflowId::generate(),
            created_at: Utc::now(),
        };
        write_json(&root.join(WORKFLOW_FILE), &workflow)?;

        Ok(Self { root, workflow })
    }

    /// Open an existing job store.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        let workflow_path = root.join(WORKFLOW_FILE);
        if !workflow_path.is_file() {
            bail!("{} is not a job store", root.display());
        }
        let workflow = read_json(&workflow_path)?;
        Ok(Self { root, workflow })
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    pub fn workflow_id(&self) -> &WorkflowId {
        &self.workflow.workflow_id
    }

    pub fn save_graph(&self, graph: &JobGraph) -> Result<()> {
        write_json(&self.root.join(GRAPH_FILE), graph)
    }

    pub fn load_graph(&self) -> Result<JobGraph> {
        let graph: JobGraph = read_json(&self.root.join(GRAPH_FILE))?;
        graph.validate()?;
        Ok(graph)
    }

    pub fn mark_completed(&self, record: &CompletionRecord) -> Result<()> {
        let path = self.root.join(JOBS_DIR).join(record_file_name(&record.job));
        write_json(&path, record)
    }

    pub fn is_completed(&self, job: &JobName) -> bool {
        self.root
            .join(JOBS_DIR)
            .join(record_file_name(job))
            .is_file()
    }

    /// All completion records, sorted by job name.
    pub fn completed(&self) -> Result<Vec<CompletionRecord>> {
        let mut records = Vec::new();
        let entries = match fs::read_dir(self.root.join(JOBS_DIR)) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(records),
            Err(e) => return Err(e.into()),
        };

        for entry in entries {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                records.push(read_json::<CompletionRecord>(&path)?);
            }
        }
        records.sort_by(|a, b| a.job.cmp(&b.job));
        Ok(records)
    }

    /// Remove the job store from disk.
    pub fn destroy(self) -> Result<()> {
        fs::remove_dir_all(&self.root)
            .with_context(|| format!("failed to remove job store {}", self.root.display()))
    }
}
