//! Pipeline wiring: which jobs exist for a given set of inputs, and how a run
//! is started or resumed.

use std::sync::Arc;

use anyhow::{anyhow, Result};
use tracing::info;

use crate::constants::HLA_GENES;
use crate::core::{JobExecutor, JobGraph, JobStore, LocalRunner, RunSummary, RunnerConfig};
use crate::jobs::{
    ArcasHlaExtractJob, ArcasHlaGenotypeJob, HlascanJob, LilacJob, Seq2HlaJob, StartJob, ToolJob,
};
use crate::options::{PipelineOptions, RunnerOptions};
use crate::types::HlaGene;

pub struct Pipeline {
    options: PipelineOptions,
}

impl Pipeline {
    pub fn new(options: PipelineOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    /// Build the job tree for the configured inputs and tools.
    ///
    /// Tool output directories are created as jobs are added.
    pub fn build_graph(&self) -> Result<JobGraph> {
        let opts = &self.options;
        info!("Reference genome: {}", opts.reference.display());

        let mut graph = JobGraph::new(StartJob::new().to_spec());
        let root = graph.root();
        let dna_samples = [opts.normal_dna.as_ref(), opts.tumor_dna.as_ref()];

        if let Some(lilac) = &opts.lilac {
            for sample in dna_samples.iter().flatten() {
                let job = LilacJob::new(&opts.outdir, &opts.reference, lilac, sample)?;
                graph.add_child(root, job.to_spec())?;
            }
        }

        if let Some(hlascan) = &opts.hlascan {
            for sample in dna_samples.iter().flatten() {
                for gene in HLA_GENES {
                    let job = HlascanJob::new(&opts.outdir, hlascan, sample, HlaGene::new(*gene))?;
                    graph.add_child(root, job.to_spec())?;
                }
            }
        }

        if let (Some(arcashla_img), Some(sample)) = (&opts.arcashla_img, &opts.tumor_rna) {
            let extract = ArcasHlaExtractJob::new(&opts.outdir, arcashla_img, sample)?;
            let genotype = ArcasHlaGenotypeJob::new(&opts.outdir, arcashla_img, sample)?;

            let extract_id = graph.add_child(root, extract.to_spec())?;
            graph.add_child(extract_id, genotype.to_spec())?;

            if let Some(seq2hla_img) = &opts.seq2hla_img {
                let seq2hla = Seq2HlaJob::new(&opts.outdir, seq2hla_img, sample)?;
                graph.add_child(extract_id, seq2hla.to_spec())?;
            }
        }

        info!("Built job graph with {} jobs", graph.len());
        Ok(graph)
    }

    /// Start a new run, or resume the one in the job store when
    /// `runner.restart` is set. Applies the clean policy afterwards.
    pub async fn run(
        &self,
        runner: &RunnerOptions,
        executor: Arc<dyn JobExecutor>,
    ) -> Result<RunSummary> {
        let (store, graph) = if runner.restart {
            let store = JobStore::open(&runner.job_store)?;
            let graph = store.load_graph()?;
            info!(
                "Restarting workflow {} from {}",
                store.workflow_id(),
                store.path().display()
            );
            (store, graph)
        } else {
            // Claim the store before build_graph creates any output directory.
            let store = JobStore::create(&runner.job_store)?;
            let graph = match self.build_graph() {
                Ok(graph) => graph,
                Err(e) => {
                    store.destroy()?;
                    return Err(e);
                }
            };
            store.save_graph(&graph)?;
            info!(
                "Starting workflow {} in {}",
                store.workflow_id(),
                store.path().display()
            );
            (store, graph)
        };

        let store = Arc::new(store);
        let summary = {
            let local = LocalRunner::new(
                executor,
                store.clone(),
                RunnerConfig {
                    max_cores: runner.max_cores,
                    retry_count: runner.retry_count,
                    write_logs: runner.write_logs.clone(),
                },
            );
            local.run(&graph).await?
        };

        if runner.clean.should_clean(summary.succeeded()) {
            let store = Arc::try_unwrap(store).map_err(|_| anyhow!("job store is still in use"))?;
            info!("Removing job store {}", store.path().display());
            store.destroy()?;
        }

        Ok(summary)
    }
}
