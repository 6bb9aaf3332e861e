//! Pipeline and runner options, and their post-parse validation.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::ValueEnum;
use tracing::warn;

use crate::config::PipelineFileConfig;
use crate::core::ContainerRuntime;
use crate::error::ValidationError;
use crate::types::SampleId;
use crate::validators::{absolutize, validate_bam, validate_paths_are_dirs, validate_reference};

/// A BAM paired with the sample ID its outputs are filed under.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub bam: PathBuf,
    pub id: SampleId,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LilacSettings {
    pub img: String,
    pub resource_dir: PathBuf,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HlascanSettings {
    pub tool: String,
    pub resource_dir: PathBuf,
}

/// Validated pipeline configuration. All paths are absolute.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineOptions {
    pub outdir: PathBuf,
    pub reference: PathBuf,
    pub normal_dna: Option<Sample>,
    pub tumor_dna: Option<Sample>,
    pub tumor_rna: Option<Sample>,
    pub lilac: Option<LilacSettings>,
    pub hlascan: Option<HlascanSettings>,
    pub arcashla_img: Option<String>,
    pub seq2hla_img: Option<String>,
}

/// Pipeline arguments as parsed, before validation.
#[derive(Debug, Clone, Default)]
pub struct RawPipelineArgs {
    pub outdir: PathBuf,
    pub reference: Option<String>,
    pub normal_dna: Option<PathBuf>,
    pub normal_dna_id: Option<String>,
    pub tumor_dna: Option<PathBuf>,
    pub tumor_dna_id: Option<String>,
    pub tumor_rna: Option<PathBuf>,
    pub tumor_rna_id: Option<String>,
    pub lilac_img: Option<String>,
    pub lilac_resource_dir: Option<PathBuf>,
    pub hlascan_tool: Option<String>,
    pub hlascan_resource_dir: Option<PathBuf>,
    pub arcashla_img: Option<String>,
    pub seq2hla_img: Option<String>,
}

impl RawPipelineArgs {
    /// Fill every unset tool setting from the config file.
    pub fn merge_config(mut self, cfg: PipelineFileConfig) -> Self {
        self.reference = self.reference.or(cfg.reference);
        self.lilac_img = self.lilac_img.or(cfg.lilac_img);
        self.lilac_resource_dir = self
            .lilac_resource_dir
            .or(cfg.lilac_resource_dir.map(PathBuf::from));
        self.hlascan_tool = self.hlascan_tool.or(cfg.hlascan_tool);
        self.hlascan_resource_dir = self
            .hlascan_resource_dir
            .or(cfg.hlascan_resource_dir.map(PathBuf::from));
        self.arcashla_img = self.arcashla_img.or(cfg.arcashla_img);
        self.seq2hla_img = self.seq2hla_img.or(cfg.seq2hla_img);
        self
    }
}

/// What to do with the job store once a run finishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum CleanPolicy {
    Always,
    OnError,
    Never,
    #[default]
    OnSuccess,
}

impl CleanPolicy {
    pub fn should_clean(self, succeeded: bool) -> bool {
        match self {
            Self::Always => true,
            Self::Never => false,
            Self::OnSuccess => succeeded,
            Self::OnError => !succeeded,
        }
    }
}

/// Options controlling the local runner rather than the pipeline itself.
#[derive(Debug, Clone)]
pub struct RunnerOptions {
    pub job_store: PathBuf,
    pub restart: bool,
    /// Extra attempts after a job's first failure.
    pub retry_count: u32,
    pub max_cores: usize,
    pub write_logs: Option<PathBuf>,
    pub clean: CleanPolicy,
    pub container: ContainerRuntime,
}

impl RunnerOptions {
    pub fn new(job_store: impl Into<PathBuf>) -> Self {
        Self {
            job_store: absolutize(job_store.into()),
            restart: false,
            retry_count: 1,
            max_cores: default_max_cores(),
            write_logs: None,
            clean: CleanPolicy::default(),
            container: ContainerRuntime::Local,
        }
    }

    /// Create the per-job log directory, if one was requested.
    pub fn prepare(&mut self) -> Result<()> {
        if let Some(dir) = self.write_logs.as_mut() {
            *dir = absolutize(&*dir);
            fs::create_dir_all(&*dir)
                .with_context(|| format!("failed to create log directory {}", dir.display()))?;
        }
        Ok(())
    }
}

pub fn default_max_cores() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// Pair a BAM with its ID; a half-specified sample is skipped with a warning.
/// IDs become directory and job names, so they must be a single path component.
fn sample_id(id: String) -> Result<SampleId, ValidationError> {
    if id.is_empty() || id == "." || id == ".." || id.contains('/') {
        return Err(ValidationError::InvalidSampleId(id));
    }
    Ok(SampleId::new(id))
}

fn pair_sample(
    label: &str,
    bam: Option<PathBuf>,
    id: Option<String>,
) -> Result<Option<Sample>, ValidationError> {
    match (bam, id) {
        (Some(bam), Some(id)) => Ok(Some(Sample {
            id: sample_id(id)?,
            bam: validate_bam(bam)?,
        })),
        (Some(bam), None) => {
            validate_bam(&bam)?;
            warn!("--{label} given without --{label}-id; sample will not be processed");
            Ok(None)
        }
        (None, Some(_)) => {
            warn!("--{label}-id given without --{label}; sample will not be processed");
            Ok(None)
        }
        (None, None) => Ok(None),
    }
}

/// Perform validations and build the final [`PipelineOptions`].
///
/// Creates the output directory.
pub fn process_parsed_options(raw: RawPipelineArgs) -> Result<PipelineOptions> {
    let reference = raw
        .reference
        .context("--reference is required (flag, HLA_PIPELINE_REFERENCE, or config file)")?;
    let reference = validate_reference(reference)?;

    let normal_dna = pair_sample("normal-dna", raw.normal_dna, raw.normal_dna_id)?;
    let tumor_dna = pair_sample("tumor-dna", raw.tumor_dna, raw.tumor_dna_id)?;
    let tumor_rna = pair_sample("tumor-rna", raw.tumor_rna, raw.tumor_rna_id)?;

    let lilac = match (raw.lilac_img, raw.lilac_resource_dir) {
        (Some(img), Some(dir)) => {
            let resource_dir = absolutize(dir);
            validate_paths_are_dirs(&[&resource_dir])?;
            Some(LilacSettings { img, resource_dir })
        }
        (Some(_), None) => {
            return Err(ValidationError::MissingDependency {
                flag: "lilac-img",
                requires: "lilac-resource-dir",
            }
            .into());
        }
        (None, _) => None,
    };

    let hlascan = match (raw.hlascan_tool, raw.hlascan_resource_dir) {
        (Some(tool), Some(dir)) => {
            let resource_dir = absolutize(dir);
            validate_paths_are_dirs(&[&resource_dir])?;
            Some(HlascanSettings { tool, resource_dir })
        }
        (Some(_), None) => {
            return Err(ValidationError::MissingDependency {
                flag: "hlascan-tool",
                requires: "hlascan-resource-dir",
            }
            .into());
        }
        (None, _) => None,
    };

    let outdir = absolutize(raw.outdir);
    fs::create_dir_all(&outdir)
        .with_context(|| format!("failed to create output directory {}", outdir.display()))?;

    Ok(PipelineOptions {
        outdir,
        reference,
        normal_dna,
        tumor_dna,
        tumor_rna,
        lilac,
        hlascan,
        arcashla_img: raw.arcashla_img,
        seq2hla_img: raw.seq2hla_img,
    })
}
