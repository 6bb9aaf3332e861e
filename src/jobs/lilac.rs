//! LILAC HLA typing on a DNA BAM.

use std::path::PathBuf;

use crate::constants::LILAC_DIR;
use crate::jobs::{ensure_dir, Invocation, Resources, ToolJob};
use crate::options::{LilacSettings, Sample};
use crate::types::{JobName, SampleId};

#[derive(Debug, Clone)]
pub struct LilacJob {
    bam: PathBuf,
    sample_id: SampleId,
    reference: PathBuf,
    lilac_dir: PathBuf,
    settings: LilacSettings,
}

impl LilacJob {
    /// Creates `<outdir>/lilac` if needed.
    pub fn new(
        outdir: &std::path::Path,
        reference: &std::path::Path,
        settings: &LilacSettings,
        sample: &Sample,
    ) -> std::io::Result<Self> {
        let lilac_dir = outdir.join(LILAC_DIR);
        ensure_dir(&lilac_dir)?;

        Ok(Self {
            bam: sample.bam.clone(),
            sample_id: sample.id.clone(),
            reference: reference.to_path_buf(),
            lilac_dir,
            settings: settings.clone(),
        })
    }
}

impl ToolJob for LilacJob {
    fn name(&self) -> JobName {
        JobName::new(format!("lilac/{}", self.sample_id))
    }

    fn resources(&self) -> Resources {
        Resources::new(1, "20G")
    }

    fn invocation(&self) -> Option<Invocation> {
        let outdir = self.lilac_dir.join(self.sample_id.as_str());

        Some(
            Invocation::new(&self.settings.img, &outdir)
                .arg("lilac")
                .arg("-sample")
                .arg(self.sample_id.as_str())
                .arg("-ref_genome")
                .path_arg(&self.reference)
                .arg("-resource_dir")
                .path_arg(&self.settings.resource_dir)
                .arg("-reference_bam")
                .path_arg(&self.bam)
                .arg("-output_dir")
                .path_arg(&outdir),
        )
    }
}
