use anyhow::Result;
use clap::{Args, Parser};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;
use hla_pipeline::{
    load_pipeline_config, options::default_max_cores, process_parsed_options, CleanPolicy,
    ContainerRuntime, Pipeline, RawPipelineArgs, RunnerOptions, Volume,
};

#[derive(Parser)]
#[command(name = "hla-pipeline", version)]
#[command(about = "Run HLA typing tools (LILAC, HLAscan, arcasHLA, seq2HLA) over DNA/RNA BAMs")]
struct Cli {
    /// Job store directory holding the workflow's checkpoints
    job_store: PathBuf,

    #[command(flatten)]
    pipeline: PipelineArgs,

    #[command(flatten)]
    runner: RunnerArgs,

    /// JSON file with default tool locations
    #[arg(long, env = "HLA_PIPELINE_CONFIG")]
    config: Option<PathBuf>,

    /// Print the job tree and exit without running anything
    #[arg(long, default_value_t = false)]
    dry_run: bool,

    /// Log level for this crate (trace, debug, info, warn, error)
    #[arg(long, alias = "logLevel", default_value = "info")]
    log_level: String,
}

#[derive(Args)]
#[command(next_help_heading = "Pipeline configuration")]
struct PipelineArgs {
    /// Path to output directory
    #[arg(long, env = "HLA_PIPELINE_OUTDIR")]
    outdir: PathBuf,
    /// Path to reference genome (a .fai index must sit next to it)
    #[arg(long, env = "HLA_PIPELINE_REFERENCE")]
    reference: Option<String>,
    /// Path to normal DNA bam file
    #[arg(long, env = "HLA_PIPELINE_NORMAL_DNA")]
    normal_dna: Option<PathBuf>,
    /// Normal DNA ID
    #[arg(long, env = "HLA_PIPELINE_NORMAL_DNA_ID")]
    normal_dna_id: Option<String>,
    /// Path to tumor DNA bam file
    #[arg(long, env = "HLA_PIPELINE_TUMOR_DNA")]
    tumor_dna: Option<PathBuf>,
    /// Tumor DNA ID
    #[arg(long, env = "HLA_PIPELINE_TUMOR_DNA_ID")]
    tumor_dna_id: Option<String>,
    /// Path to tumor RNA bam file
    #[arg(long, env = "HLA_PIPELINE_TUMOR_RNA")]
    tumor_rna: Option<PathBuf>,
    /// Tumor RNA ID
    #[arg(long, env = "HLA_PIPELINE_TUMOR_RNA_ID")]
    tumor_rna_id: Option<String>,
    /// Lilac image
    #[arg(long, env = "HLA_PIPELINE_LILAC_IMG")]
    lilac_img: Option<String>,
    /// Path to Lilac resource directory
    #[arg(long, env = "HLA_PIPELINE_LILAC_RESOURCE_DIR")]
    lilac_resource_dir: Option<PathBuf>,
    /// HLAscan binary
    #[arg(long, env = "HLA_PIPELINE_HLASCAN_TOOL")]
    hlascan_tool: Option<String>,
    /// Path to HLAscan resource directory
    #[arg(long, env = "HLA_PIPELINE_HLASCAN_RESOURCE_DIR")]
    hlascan_resource_dir: Option<PathBuf>,
    /// arcasHLA image
    #[arg(long, env = "HLA_PIPELINE_ARCASHLA_IMG")]
    arcashla_img: Option<String>,
    /// seq2HLA image
    #[arg(long, env = "HLA_PIPELINE_SEQ2HLA_IMG")]
    seq2hla_img: Option<String>,
}

#[derive(Args)]
#[command(next_help_heading = "Runner options")]
struct RunnerArgs {
    /// Resume the workflow in the job store instead of starting a new one
    #[arg(long, default_value_t = false)]
    restart: bool,
    /// Extra attempts for a failing job
    #[arg(long, alias = "retryCount", default_value_t = 1)]
    retry_count: u32,
    /// Cores shared by concurrently running jobs [default: all available]
    #[arg(long, alias = "maxCores")]
    max_cores: Option<usize>,
    /// Directory receiving one log file per job
    #[arg(long, alias = "writeLogs")]
    write_logs: Option<PathBuf>,
    /// When to delete the job store after the run
    #[arg(long, value_enum, default_value_t = CleanPolicy::OnSuccess)]
    clean: CleanPolicy,
    /// Run containerised jobs inside this Docker image
    #[arg(long, conflicts_with = "singularity")]
    docker: Option<String>,
    /// Run containerised jobs inside this Singularity image
    #[arg(long)]
    singularity: Option<String>,
    /// Bind mount for container runs, as SRC:DST (repeatable)
    #[arg(long = "volume")]
    volumes: Vec<Volume>,
}

impl From<PipelineArgs> for RawPipelineArgs {
    fn from(a: PipelineArgs) -> Self {
        RawPipelineArgs {
            outdir: a.outdir,
            reference: a.reference,
            normal_dna: a.normal_dna,
            normal_dna_id: a.normal_dna_id,
            tumor_dna: a.tumor_dna,
            tumor_dna_id: a.tumor_dna_id,
            tumor_rna: a.tumor_rna,
            tumor_rna_id: a.tumor_rna_id,
            lilac_img: a.lilac_img,
            lilac_resource_dir: a.lilac_resource_dir,
            hlascan_tool: a.hlascan_tool,
            hlascan_resource_dir: a.hlascan_resource_dir,
            arcashla_img: a.arcashla_img,
            seq2hla_img: a.seq2hla_img,
        }
    }
}

fn build_runner_options(job_store: PathBuf, args: RunnerArgs) -> RunnerOptions {
    let container = match (args.docker, args.singularity) {
        (Some(image), _) => ContainerRuntime::Docker {
            image,
            volumes: args.volumes,
        },
        (None, Some(image)) => ContainerRuntime::Singularity {
            image,
            volumes: args.volumes,
        },
        (None, None) => ContainerRuntime::Local,
    };

    let mut runner = RunnerOptions::new(job_store);
    runner.restart = args.restart;
    runner.retry_count = args.retry_count;
    runner.max_cores = args.max_cores.unwrap_or_else(default_max_cores);
    runner.write_logs = args.write_logs;
    runner.clean = args.clean;
    runner.container = container;
    runner
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive(format!("hla_pipeline={}", cli.log_level).parse()?),
        )
        .init();

    let config = load_pipeline_config(cli.config.as_deref())?;
    let raw = RawPipelineArgs::from(cli.pipeline).merge_config(config);
    let runner = build_runner_options(cli.job_store, cli.runner);

    if cli.dry_run {
        let options = process_parsed_options(raw)?;
        let graph = Pipeline::new(options).build_graph()?;
        print!("{}", graph.render());
        return Ok(());
    }

    info!("Job store: {}", runner.job_store.display());
    let summary = hla_pipeline::run_pipeline(raw, runner).await?;
    println!(
        "Completed {} job(s), skipped {} already finished",
        summary.completed.len(),
        summary.skipped.len()
    );

    Ok(())
}
