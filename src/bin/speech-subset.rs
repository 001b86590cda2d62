use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use log::info;
use speech_subset::aggregate::scan_dataset;
use speech_subset::batch::run_job;
use speech_subset::config::JobConfig;
use speech_subset::sink::write_metadata;
use speech_subset::Label;
use std::path::PathBuf;
use std::process;

#[derive(Parser)]
#[command(name = "speech-subset")]
#[command(about = "Sample labelled subsets of real and synthetic speech corpora", long_about = None)]
#[command(version)]
struct Cli {
    /// Log per-record detail
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the batches of a job file and write their metadata
    Sample {
        #[arg(short, long)]
        config: PathBuf,

        /// Validate the job without reading or writing clips
        #[arg(long)]
        dry_run: bool,
    },

    /// Rebuild a metadata table from a dataset tree of <language>/*.wav
    Aggregate {
        #[arg(short, long, default_value = "datasets")]
        root: PathBuf,

        #[arg(short, long, default_value = "metadata/aggregated_metadata.csv")]
        output: PathBuf,

        #[arg(short, long, default_value = "real")]
        label: Label,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level)).init();

    let result = match cli.command {
        Commands::Sample { config, dry_run } => handle_sample(config, dry_run),
        Commands::Aggregate { root, output, label } => handle_aggregate(root, output, label),
    };

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}

fn handle_sample(config_path: PathBuf, dry_run: bool) -> Result<()> {
    let config = JobConfig::load(&config_path)
        .with_context(|| format!("Failed to load job config {:?}", config_path))?;

    if dry_run {
        let plans = config.plan()?;
        for plan in &plans {
            info!(
                "Batch {:?}: up to {} clips into {:?}",
                plan.name,
                plan.sampler.policy().target_count,
                plan.output_dir
            );
        }
        info!("Job is valid ({} batches)", plans.len());
        return Ok(());
    }

    let report = run_job(&config)?;
    let accepted: usize = report
        .batches
        .iter()
        .filter_map(|b| b.outcome.as_ref().ok())
        .map(|r| r.accepted_count())
        .sum();
    info!("Sampled {} clips across {} batches", accepted, report.batches.len());

    if report.batches.iter().all(|b| b.outcome.is_err()) {
        bail!("no batch could be run");
    }
    Ok(())
}

fn handle_aggregate(root: PathBuf, output: PathBuf, label: Label) -> Result<()> {
    let rows = scan_dataset(&root, label)
        .with_context(|| format!("Failed to scan dataset root {:?}", root))?;
    if rows.is_empty() {
        bail!("no WAV clips found under {:?}", root);
    }
    write_metadata(&output, &rows)?;
    info!("Metadata saved. Total samples: {}", rows.len());
    Ok(())
}
