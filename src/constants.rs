// Fixed tool parameters shared by the job builders.

/// Loci HLAscan is run on; one job per locus per DNA sample.
pub const HLA_GENES: &[&str] = &[
    "HLA-A", "HLA-B", "HLA-C", "HLA-DPA1", "HLA-DPB1", "HLA-DQA1", "HLA-DQB1", "HLA-DRB1",
];

/// Loci passed to `arcasHLA genotype -g`.
pub const ARCASHLA_GENES: &str = "A,B,C,DPB1,DQB1,DQA1,DRB1";

/// Reference build passed to HLAscan `-v`.
pub const HLASCAN_GENOME_VERSION: &str = "37";

/// Threads used by arcasHLA, and cores requested by every RNA job.
pub const RNA_THREADS: u32 = 8;

pub const LILAC_DIR: &str = "lilac";
pub const HLASCAN_DIR: &str = "hlascan";
pub const ARCASHLA_DIR: &str = "arcashla";
pub const SEQ2HLA_DIR: &str = "seq2hla";

/// Default wall-time hint for every job, in minutes.
pub const DEFAULT_RUNTIME_MINUTES: u32 = 90;
