//! arcasHLA extract and genotype on an RNA BAM.
//!
//! `extract` pulls the chr6/HLA reads into paired FASTQs under
//! `<outdir>/arcashla/<id>`; `genotype` runs on those FASTQs and must run
//! after it.

use std::path::{Path, PathBuf};

use crate::constants::{ARCASHLA_DIR, ARCASHLA_GENES, RNA_THREADS, SEQ2HLA_DIR};
use crate::jobs::{ensure_dir, Invocation, Resources, ToolJob};
use crate::options::Sample;
use crate::types::{JobName, SampleId};

/// State shared by all RNA jobs: both RNA tool directories exist once any
/// RNA job has been built.
#[derive(Debug, Clone)]
pub(crate) struct RnaJobBase {
    pub bam: PathBuf,
    pub sample_id: SampleId,
    pub arcashla_dir: PathBuf,
    pub seq2hla_dir: PathBuf,
}

impl RnaJobBase {
    pub fn new(outdir: &Path, sample: &Sample) -> std::io::Result<Self> {
        let arcashla_dir = outdir.join(ARCASHLA_DIR);
        let seq2hla_dir = outdir.join(SEQ2HLA_DIR);
        ensure_dir(&arcashla_dir)?;
        ensure_dir(&seq2hla_dir)?;

        Ok(Self {
            bam: sample.bam.clone(),
            sample_id: sample.id.clone(),
            arcashla_dir,
            seq2hla_dir,
        })
    }

    pub fn resources() -> Resources {
        Resources::new(RNA_THREADS, "20G")
    }

    pub fn arcashla_sample_dir(&self) -> PathBuf {
        self.arcashla_dir.join(self.sample_id.as_str())
    }

    /// Paired FASTQs written by `arcasHLA extract`.
    pub fn extracted_fastqs(&self) -> (PathBuf, PathBuf) {
        let dir = self.arcashla_sample_dir();
        (
            dir.join(format!("{}.extracted.1.fq.gz", self.sample_id)),
            dir.join(format!("{}.extracted.2.fq.gz", self.sample_id)),
        )
    }
}

#[derive(Debug, Clone)]
pub struct ArcasHlaExtractJob {
    base: RnaJobBase,
    img: String,
}

impl ArcasHlaExtractJob {
    pub fn new(outdir: &Path, img: &str, sample: &Sample) -> std::io::Result<Self> {
        Ok(Self {
            base: RnaJobBase::new(outdir, sample)?,
            img: img.to_string(),
        })
    }
}

impl ToolJob for ArcasHlaExtractJob {
    fn name(&self) -> JobName {
        JobName::new(format!("arcashla-extract/{}", self.base.sample_id))
    }

    fn resources(&self) -> Resources {
        RnaJobBase::resources()
    }

    fn invocation(&self) -> Option<Invocation> {
        let outdir = self.base.arcashla_sample_dir();

        // Runs from the tool directory, not the sample directory.
        Some(
            Invocation::new(&self.img, &self.base.arcashla_dir)
                .workdir(&outdir)
                .arg("extract")
                .path_arg(&self.base.bam)
                .arg("-o")
                .path_arg(&outdir)
                .arg("-t")
                .arg(RNA_THREADS.to_string())
                .arg("-v"),
        )
    }
}

#[derive(Debug, Clone)]
pub struct ArcasHlaGenotypeJob {
    base: RnaJobBase,
    img: String,
}

impl ArcasHlaGenotypeJob {
    pub fn new(outdir: &Path, img: &str, sample: &Sample) -> std::io::Result<Self> {
        Ok(Self {
            base: RnaJobBase::new(outdir, sample)?,
            img: img.to_string(),
        })
    }
}

impl ToolJob for ArcasHlaGenotypeJob {
    fn name(&self) -> JobName {
        JobName::new(format!("arcashla-genotype/{}", self.base.sample_id))
    }

    fn resources(&self) -> Resources {
        RnaJobBase::resources()
    }

    fn invocation(&self) -> Option<Invocation> {
        let outdir = self.base.arcashla_sample_dir();
        let (fq1, fq2) = self.base.extracted_fastqs();

        Some(
            Invocation::new(&self.img, &outdir)
                .arg("genotype")
                .path_arg(&fq1)
                .path_arg(&fq2)
                .arg("-g")
                .arg(ARCASHLA_GENES)
                .arg("-o")
                .path_arg(&outdir)
                .arg("-t")
                .arg(RNA_THREADS.to_string())
                .arg("-v"),
        )
    }
}
