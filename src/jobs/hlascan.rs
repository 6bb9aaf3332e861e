//! HLAscan on a single locus of a DNA BAM.

use std::path::{Path, PathBuf};

use crate::constants::{HLASCAN_DIR, HLASCAN_GENOME_VERSION};
use crate::jobs::{ensure_dir, Invocation, Resources, ToolJob};
use crate::options::{HlascanSettings, Sample};
use crate::types::{HlaGene, JobName, SampleId};

/// HLAscan exits non-zero when a locus has no usable reads, so failures are
/// tolerated and the per-locus report is whatever it wrote to stdout.
#[derive(Debug, Clone)]
pub struct HlascanJob {
    bam: PathBuf,
    sample_id: SampleId,
    gene: HlaGene,
    hlascan_dir: PathBuf,
    settings: HlascanSettings,
}

impl HlascanJob {
    /// Creates `<outdir>/hlascan` if needed.
    pub fn new(
        outdir: &Path,
        settings: &HlascanSettings,
        sample: &Sample,
        gene: HlaGene,
    ) -> std::io::Result<Self> {
        let hlascan_dir = outdir.join(HLASCAN_DIR);
        ensure_dir(&hlascan_dir)?;

        Ok(Self {
            bam: sample.bam.clone(),
            sample_id: sample.id.clone(),
            gene,
            hlascan_dir,
            settings: settings.clone(),
        })
    }
}

impl ToolJob for HlascanJob {
    fn name(&self) -> JobName {
        JobName::new(format!("hlascan/{}/{}", self.sample_id, self.gene))
    }

    fn resources(&self) -> Resources {
        Resources::new(1, "20G")
    }

    fn invocation(&self) -> Option<Invocation> {
        let outdir = self.hlascan_dir.join(self.sample_id.as_str());
        let report = outdir.join(format!("{}.txt", self.gene));

        Some(
            Invocation::new(&self.settings.tool, &outdir)
                .arg("-b")
                .path_arg(&self.bam)
                .arg("-v")
                .arg(HLASCAN_GENOME_VERSION)
                .arg("-g")
                .arg(self.gene.as_str())
                .arg("-d")
                .path_arg(&self.settings.resource_dir)
                .stdout_to(report)
                .tolerate_failure()
                .uncontainerized(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::test_support::{full_options, out};

    #[test]
    fn test_hlascan_command() {
        let dir = tempfile::TempDir::new().unwrap();
        let opts = full_options(&dir);
        let sample = opts.normal_dna.as_ref().unwrap();

        let job = HlascanJob::new(
            &opts.outdir,
            opts.hlascan.as_ref().unwrap(),
            sample,
            HlaGene::new("HLA-DRB1"),
        )
        .unwrap();
        assert!(out(&opts, &["hlascan"]).is_dir());

        let spec = job.to_spec();
        assert_eq!(spec.name.as_str(), "hlascan/N1/HLA-DRB1");

        let inv = spec.command.unwrap();
        assert_eq!(inv.program, "hla_scan");
        assert_eq!(
            inv.args,
            vec![
                "-b".to_string(),
                sample.bam.display().to_string(),
                "-v".into(),
                "37".into(),
                "-g".into(),
                "HLA-DRB1".into(),
                "-d".into(),
                dir.path().join("hlascan-res").display().to_string(),
            ]
        );
        assert_eq!(inv.cwd, out(&opts, &["hlascan", "N1"]));
        assert_eq!(inv.stdout, Some(out(&opts, &["hlascan", "N1", "HLA-DRB1.txt"])));
        assert!(inv.tolerate_failure);
        assert!(!inv.containerized);
    }
}
