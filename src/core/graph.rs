// Static job tree built once per run

use std::collections::HashSet;
use std::fmt::Write as _;

use anyhow::{anyhow, bail, Result};
use serde::{Deserialize, Serialize};

use crate::jobs::JobSpec;
use crate::types::JobName;

/// Index of a node inside a [`JobGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobNodeId(usize);

#[derive(Debug, Clone, Serialize, Deserialize)]
struct JobNode {
    spec: JobSpec,
    children: Vec<JobNodeId>,
}

/// A tree of jobs: every node runs after its parent succeeded, siblings are
/// independent of each other.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobGraph {
    nodes: Vec<JobNode>,
}

impl JobGraph {
    pub fn new(root: JobSpec) -> Self {
        Self {
            nodes: vec![JobNode {
                spec: root,
                children: Vec::new(),
            }],
        }
    }

    pub fn root(&self) -> JobNodeId {
        JobNodeId(0)
    }

    /// Attach `spec` below `parent`. Job names must be unique.
    pub fn add_child(&mut self, parent: JobNodeId, spec: JobSpec) -> Result<JobNodeId> {
        if parent.0 >= self.nodes.len() {
            bail!("unknown parent node {:?}", parent);
        }
        if self.find(&spec.name).is_some() {
            bail!("duplicate job name {}", spec.name);
        }

        let id = JobNodeId(self.nodes.len());
        self.nodes.push(JobNode {
            spec,
            children: Vec::new(),
        });
        self.nodes[parent.0].children.push(id);
        Ok(id)
    }

    pub fn get(&self, id: JobNodeId) -> Option<&JobSpec> {
        self.nodes.get(id.0).map(|n| &n.spec)
    }

    pub fn children(&self, id: JobNodeId) -> &[JobNodeId] {
        self.nodes
            .get(id.0)
            .map(|n| n.children.as_slice())
            .unwrap_or(&[])
    }

    pub fn find(&self, name: &JobName) -> Option<JobNodeId> {
        self.nodes
            .iter()
            .position(|n| &n.spec.name == name)
            .map(JobNodeId)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (JobNodeId, &JobSpec)> {
        self.nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (JobNodeId(i), &n.spec))
    }

    /// Number of nodes on the longest root-to-leaf path.
    pub fn depth(&self) -> usize {
        fn walk(graph: &JobGraph, id: JobNodeId) -> usize {
            1 + graph
                .children(id)
                .iter()
                .map(|&c| walk(graph, c))
                .max()
                .unwrap_or(0)
        }
        walk(self, self.root())
    }

    /// Number of nodes below `id`, excluding `id` itself.
    pub fn descendant_count(&self, id: JobNodeId) -> usize {
        self.children(id)
            .iter()
            .map(|&c| 1 + self.descendant_count(c))
            .sum()
    }

    /// Check the tree shape after deserialising a graph from disk.
    pub fn validate(&self) -> Result<()> {
        if self.nodes.is_empty() {
            bail!("job graph has no root");
        }

        let mut names = HashSet::new();
        let mut seen = vec![false; self.nodes.len()];
        seen[0] = true;
        for node in &self.nodes {
            if !names.insert(&node.spec.name) {
                bail!("duplicate job name {}", node.spec.name);
            }
            for child in &node.children {
                let slot = seen
                    .get_mut(child.0)
                    .ok_or_else(|| anyhow!("dangling child {:?}", child))?;
                if *slot {
                    bail!("node {:?} has more than one parent", child);
                }
                *slot = true;
            }
        }

        // One parent per node still admits cycles detached from the root.
        let mut reached = vec![false; self.nodes.len()];
        let mut stack = vec![self.root()];
        while let Some(id) = stack.pop() {
            if std::mem::replace(&mut reached[id.0], true) {
                bail!("node {:?} is part of a cycle", id);
            }
            stack.extend(self.children(id).iter().copied());
        }
        if let Some(orphan) = reached.iter().position(|r| !r) {
            bail!("node {} is unreachable from the root", orphan);
        }
        Ok(())
    }

    /// Indented listing of the tree, one job per line.
    pub fn render(&self) -> String {
        fn walk(graph: &JobGraph, id: JobNodeId, level: usize, out: &mut String) {
            if let Some(spec) = graph.get(id) {
                let _ = write!(out, "{}{}", "  ".repeat(level), spec.name);
                if let Some(cmd) = &spec.command {
                    let _ = write!(out, "\t{}", cmd.argv().join(" "));
                }
                out.push('\n');
            }
            for &child in graph.children(id) {
                walk(graph, child, level + 1, out);
            }
        }

        let mut out = String::new();
        walk(self, self.root(), 0, &mut out);
        out
    }
}
