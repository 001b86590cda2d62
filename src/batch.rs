//! Sequential execution of the batches in a job

use crate::aggregate::concat;
use crate::config::{BatchPlan, JobConfig};
use crate::sampler::{MetadataRow, SampleResult};
use crate::sink::write_metadata;
use crate::writer::WavClipWriter;
use crate::Result;
use log::{error, info, warn};

/// Result of one batch; `Err` holds why the batch could not start
#[derive(Debug)]
pub struct BatchReport {
    pub name: String,
    pub outcome: std::result::Result<SampleResult, String>,
}

/// Everything a job produced
#[derive(Debug)]
pub struct JobReport {
    pub batches: Vec<BatchReport>,
    pub rows: Vec<MetadataRow>,
    /// Set when metadata was written
    pub metadata_written: bool,
}

/// Run a single planned batch with its own writer and naming scope
///
/// # Arguments
///
/// * `plan` - A batch resolved by `JobConfig::plan`
///
/// # Returns
///
/// The batch's sampling result; per-record faults are inside it
///
/// # Errors
///
/// Returns an error if the source cannot be opened or the output directory
/// cannot be created
pub fn run_batch(plan: &BatchPlan) -> Result<SampleResult> {
    info!("Sampling batch {:?} into {:?}", plan.name, plan.output_dir);
    let source = plan.source.open()?;
    let writer = WavClipWriter::new(&plan.output_dir)?;
    Ok(plan.sampler.run(source, writer))
}

/// Validate the whole job, then run its batches one after the other
///
/// A batch whose source or output directory cannot be opened is reported and
/// skipped; only configuration errors abort the job, and they do so before
/// any clip is read.
///
/// # Errors
///
/// Returns `Error::InvalidConfig` from planning, or an I/O error if the
/// metadata file cannot be written
pub fn run_job(config: &JobConfig) -> Result<JobReport> {
    let plans = config.plan()?;

    let mut batches = Vec::with_capacity(plans.len());
    for plan in &plans {
        let outcome = match run_batch(plan) {
            Ok(result) => {
                info!("Batch {:?}: {}", plan.name, result.summary());
                if !result.is_complete() {
                    warn!(
                        "Batch {:?} fell short of its target: {}/{}",
                        plan.name,
                        result.accepted_count(),
                        result.target_count
                    );
                }
                Ok(result)
            }
            Err(e) => {
                error!("Batch {:?} could not run: {}", plan.name, e);
                Err(e.to_string())
            }
        };
        batches.push(BatchReport {
            name: plan.name.clone(),
            outcome,
        });
    }

    let rows = concat(
        batches
            .iter()
            .filter_map(|b| b.outcome.as_ref().ok())
            .cloned(),
    );

    let metadata_written = if rows.is_empty() {
        warn!("No samples were processed");
        false
    } else {
        write_metadata(&config.metadata_path, &rows)?;
        true
    };

    Ok(JobReport {
        batches,
        rows,
        metadata_written,
    })
}
