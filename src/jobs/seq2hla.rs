use std::path::Path;

use crate::jobs::arcashla::RnaJobBase;
use crate::jobs::{Invocation, Resources, ToolJob};
use crate::options::Sample;
use crate::types::JobName;

/// seq2HLA on the FASTQs produced by arcasHLA extract.
#[derive(Debug, Clone)]
pub struct Seq2HlaJob {
    base: RnaJobBase,
    img: String,
}

impl Seq2HlaJob {
    pub fn new(outdir: &Path, img: &str, sample: &Sample) -> std::io::Result<Self> {
        Ok(Self {
            base: RnaJobBase::new(outdir, sample)?,
            img: img.to_string(),
        })
    }
}

impl ToolJob for Seq2HlaJob {
    fn name(&self) -> JobName {
        JobName::new(format!("seq2hla/{}", self.base.sample_id))
    }

    fn resources(&self) -> Resources {
        RnaJobBase::resources()
    }

    fn invocation(&self) -> Option<Invocation> {
        let outdir = self.base.seq2hla_dir.join(self.base.sample_id.as_str());
        let (fq1, fq2) = self.base.extracted_fastqs();

        Some(
            Invocation::new(&self.img, outdir)
                .arg("-1")
                .path_arg(&fq1)
                .arg("-2")
                .path_arg(&fq2)
                .arg("-r")
                .arg(self.base.sample_id.as_str()),
        )
    }
}
