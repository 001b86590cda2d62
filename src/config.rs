//! Job configuration
//!
//! A job is a JSON file describing where clips come from, how they are
//! filtered and where they go. Several batches (one per language, say) can
//! share the job-level source and policy or override them. Everything is
//! checked by `JobConfig::plan` before any clip is read.

use crate::policy::AcceptancePolicy;
use crate::record::SourceRecord;
use crate::sampler::{RunSpec, Sampler};
use crate::source::{CommonVoiceSource, ManifestSource};
use crate::{Error, Label, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

/// Boxed record iterator handed to the sampler
pub type RecordStream = Box<dyn Iterator<Item = Result<SourceRecord>>>;

/// Where a batch reads its records from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceConfig {
    Manifest {
        /// JSON-lines manifest
        path: PathBuf,
        /// Read at most this many rows
        #[serde(default)]
        scan_limit: Option<usize>,
    },
    CommonVoice {
        /// Split file such as `train.tsv`
        tsv: PathBuf,
        /// Directory holding the clips named in the TSV
        clips_dir: PathBuf,
        #[serde(default)]
        scan_limit: Option<usize>,
    },
}

impl SourceConfig {
    fn scan_limit(&self) -> Option<usize> {
        match self {
            SourceConfig::Manifest { scan_limit, .. } | SourceConfig::CommonVoice { scan_limit, .. } => {
                *scan_limit
            }
        }
    }

    fn validate(&self) -> Result<()> {
        if self.scan_limit() == Some(0) {
            return Err(Error::InvalidConfig("scan_limit must be positive".into()));
        }
        Ok(())
    }

    /// Open the source, applying `scan_limit`
    ///
    /// # Errors
    ///
    /// Returns an error if the manifest or TSV file cannot be opened
    pub fn open(&self) -> Result<RecordStream> {
        let stream: RecordStream = match self {
            SourceConfig::Manifest { path, .. } => Box::new(ManifestSource::open(path)?),
            SourceConfig::CommonVoice { tsv, clips_dir, .. } => {
                Box::new(CommonVoiceSource::open(tsv, clips_dir)?)
            }
        };
        Ok(match self.scan_limit() {
            Some(limit) => Box::new(stream.take(limit)),
            None => stream,
        })
    }
}

/// One sequential sampling pass within a job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchConfig {
    pub name: String,
    /// Filename prefix, defaults to `name`
    #[serde(default)]
    pub prefix: Option<String>,
    #[serde(default)]
    pub source: Option<SourceConfig>,
    #[serde(default)]
    pub policy: Option<AcceptancePolicy>,
    #[serde(default)]
    pub extra_fields: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobConfig {
    /// Root for clips; each batch writes to `<output_dir>/<batch name>`
    pub output_dir: PathBuf,
    /// Combined metadata table, `.json` or CSV
    pub metadata_path: PathBuf,
    pub label: Label,
    #[serde(default)]
    pub source_name: String,
    /// Prefix for a job without batches
    #[serde(default)]
    pub prefix: Option<String>,
    /// Default source for batches that don't name one
    #[serde(default)]
    pub source: Option<SourceConfig>,
    /// Default policy for batches that don't name one
    #[serde(default)]
    pub policy: Option<AcceptancePolicy>,
    /// Columns added to every row; batch entries win on conflict
    #[serde(default)]
    pub extra_fields: BTreeMap<String, String>,
    #[serde(default)]
    pub batches: Vec<BatchConfig>,
}

/// A fully resolved, validated batch
#[derive(Debug, Clone)]
pub struct BatchPlan {
    pub name: String,
    /// Sampler carrying the batch's policy and naming
    pub sampler: Sampler,
    pub source: SourceConfig,
    /// Directory the batch's clips are written to
    pub output_dir: PathBuf,
}

impl JobConfig {
    /// Read a job file
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the JSON job file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not a valid job.
    /// Semantic checks happen later, in `plan`.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = fs::read_to_string(path.as_ref())?;
        let config = serde_json::from_str(&text)?;
        Ok(config)
    }

    /// Resolve every batch against the job defaults and validate it
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidConfig` if a batch has no source or policy, a
    /// policy is malformed, batch names repeat, or a job without batches has
    /// no prefix.
    pub fn plan(&self) -> Result<Vec<BatchPlan>> {
        if self.batches.is_empty() {
            let prefix = self.prefix.clone().ok_or_else(|| {
                Error::InvalidConfig("a job without batches needs a prefix".into())
            })?;
            let batch = BatchConfig {
                name: prefix.clone(),
                prefix: Some(prefix),
                source: None,
                policy: None,
                extra_fields: BTreeMap::new(),
            };
            return Ok(vec![self.resolve(&batch, self.output_dir.clone())?]);
        }

        let mut seen = HashSet::new();
        let mut plans = Vec::with_capacity(self.batches.len());
        for batch in &self.batches {
            if batch.name.trim().is_empty() || batch.name.contains(|c: char| c == '/' || c == '\\') {
                return Err(Error::InvalidConfig(format!(
                    "invalid batch name {:?}",
                    batch.name
                )));
            }
            if !seen.insert(batch.name.as_str()) {
                return Err(Error::InvalidConfig(format!(
                    "batch {:?} appears more than once",
                    batch.name
                )));
            }
            plans.push(self.resolve(batch, self.output_dir.join(&batch.name))?);
        }
        Ok(plans)
    }

    fn resolve(&self, batch: &BatchConfig, output_dir: PathBuf) -> Result<BatchPlan> {
        let source = batch
            .source
            .as_ref()
            .or(self.source.as_ref())
            .cloned()
            .ok_or_else(|| Error::InvalidConfig(format!("batch {:?} has no source", batch.name)))?;
        source.validate()?;

        let policy = batch
            .policy
            .as_ref()
            .or(self.policy.as_ref())
            .cloned()
            .ok_or_else(|| Error::InvalidConfig(format!("batch {:?} has no policy", batch.name)))?;

        let mut spec = RunSpec::new(
            batch.prefix.clone().unwrap_or_else(|| batch.name.clone()),
            self.label,
        )
        .with_source_name(self.source_name.clone());
        spec.extra_fields = self.extra_fields.clone();
        spec.extra_fields
            .extend(batch.extra_fields.iter().map(|(k, v)| (k.clone(), v.clone())));

        let sampler = Sampler::new(policy, spec).map_err(|e| match e {
            Error::InvalidConfig(msg) => Error::InvalidConfig(format!("batch {:?}: {}", batch.name, msg)),
            other => other,
        })?;

        Ok(BatchPlan {
            name: batch.name.clone(),
            sampler,
            source,
            output_dir,
        })
    }
}
