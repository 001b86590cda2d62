//! Bounded, filtered sampling over a dataset source
//!
//! The sampler pulls records one at a time, drops the ones the acceptance
//! policy rejects, persists the rest through a `ClipWriter` and stops as soon
//! as the target count is reached or the source runs dry.
//!
//! # Example
//!
//! ```rust,no_run
//! use speech_subset::{AcceptancePolicy, Label, RunSpec, Sampler, WavClipWriter};
//! use speech_subset::source::ManifestSource;
//!
//! let policy = AcceptancePolicy::new(20).with_duration_bounds(Some(1.0), Some(10.0));
//! let sampler = Sampler::new(policy, RunSpec::new("codecfake", Label::Fake))?;
//! let source = ManifestSource::open("codecfake/manifest.jsonl")?;
//! let writer = WavClipWriter::new("datasets/fake_speech/codecfake")?;
//! let result = sampler.run(source, writer);
//! println!("{}", result.summary());
//! # Ok::<(), speech_subset::Error>(())
//! ```

use crate::policy::AcceptancePolicy;
use crate::record::{FieldValue, Payload, SourceRecord};
use crate::writer::ClipWriter;
use crate::{Error, Label, Result};
use log::{debug, info, trace, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Extension of every clip the sampler names
pub const CLIP_EXTENSION: &str = "wav";

/// Column names owned by the metadata row itself
pub const RESERVED_COLUMNS: [&str; 5] = ["filename", "label", "duration", "path", "source"];

/// Per-run naming and labelling
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSpec {
    /// Filename prefix; clips are named `<prefix>_<n>.wav`
    pub prefix: String,
    /// Whether the clips are real or synthetic speech
    pub label: Label,
    /// Dataset name written to the `source` column
    #[serde(default)]
    pub source_name: String,
    /// Constant columns stamped on every row, e.g. the batch language
    #[serde(default)]
    pub extra_fields: BTreeMap<String, String>,
}

impl RunSpec {
    pub fn new(prefix: impl Into<String>, label: Label) -> Self {
        Self {
            prefix: prefix.into(),
            label,
            source_name: String::new(),
            extra_fields: BTreeMap::new(),
        }
    }

    pub fn with_source_name(mut self, name: impl Into<String>) -> Self {
        self.source_name = name.into();
        self
    }

    pub fn with_extra_field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra_fields.insert(key.into(), value.into());
        self
    }

    /// Filename of the clip accepted at `index`
    pub fn filename(&self, index: usize) -> String {
        format!("{}_{}.{}", self.prefix, index, CLIP_EXTENSION)
    }
}

/// One line of the output metadata table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataRow {
    /// Clip filename, unique within a run
    pub filename: String,
    pub label: Label,
    /// Clip length in seconds, rounded to two decimals
    pub duration: Option<f64>,
    /// Where the writer stored the clip
    pub path: String,
    /// Dataset the clip was sampled from
    #[serde(rename = "source")]
    pub source_name: String,
    /// Label fields of the source record plus the run's extra fields
    #[serde(flatten)]
    pub fields: BTreeMap<String, FieldValue>,
}

/// A fault isolated to a single source record
#[derive(Debug, Clone, PartialEq)]
pub struct RecordFailure {
    /// Position of the record in the source sequence
    pub index: usize,
    /// Display form of the underlying error
    pub reason: String,
}

impl fmt::Display for RecordFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "record {}: {}", self.index, self.reason)
    }
}

/// Outcome of one sampling run
#[derive(Debug, Clone, PartialEq)]
pub struct SampleResult {
    pub target_count: usize,
    pub metadata_rows: Vec<MetadataRow>,
    pub failures: Vec<RecordFailure>,
    /// Source records pulled, including rejected and failed ones
    pub records_seen: usize,
    pub rejected_count: usize,
}

impl SampleResult {
    fn new(target_count: usize) -> Self {
        Self {
            target_count,
            metadata_rows: Vec::new(),
            failures: Vec::new(),
            records_seen: 0,
            rejected_count: 0,
        }
    }

    pub fn accepted_count(&self) -> usize {
        self.metadata_rows.len()
    }

    /// Whether the run reached its target before the source was exhausted
    pub fn is_complete(&self) -> bool {
        self.accepted_count() == self.target_count
    }

    pub fn summary(&self) -> String {
        let mut out = format!(
            "accepted {}/{} ({} seen, {} rejected, {} failed)",
            self.accepted_count(),
            self.target_count,
            self.records_seen,
            self.rejected_count,
            self.failures.len()
        );
        for failure in &self.failures {
            out.push_str(&format!("\n  {}", failure));
        }
        out
    }

    pub fn into_rows(self) -> Vec<MetadataRow> {
        self.metadata_rows
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Single-pass sampler bound to a validated policy
#[derive(Debug, Clone)]
pub struct Sampler {
    policy: AcceptancePolicy,
    spec: RunSpec,
}

impl Sampler {
    /// Validate the policy and naming before any I/O happens
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidConfig` if:
    /// * `target_count` is zero
    /// * A duration bound is negative or not finite, or `min_duration > max_duration`
    /// * The filename prefix is blank or contains a path separator
    /// * An extra field is named like a fixed column (`filename`, `label`,
    ///   `duration`, `path`, `source`)
    pub fn new(policy: AcceptancePolicy, spec: RunSpec) -> Result<Self> {
        policy.validate()?;
        if spec.prefix.trim().is_empty() {
            return Err(Error::InvalidConfig("prefix must not be empty".into()));
        }
        if spec.prefix.contains(|c: char| c == '/' || c == '\\') {
            return Err(Error::InvalidConfig(format!(
                "prefix {:?} must not contain path separators",
                spec.prefix
            )));
        }
        if let Some(key) = spec
            .extra_fields
            .keys()
            .find(|key| RESERVED_COLUMNS.contains(&key.as_str()))
        {
            return Err(Error::InvalidConfig(format!(
                "extra field {:?} clashes with a fixed metadata column",
                key
            )));
        }
        Ok(Self { policy, spec })
    }

    pub fn policy(&self) -> &AcceptancePolicy {
        &self.policy
    }

    pub fn spec(&self) -> &RunSpec {
        &self.spec
    }

    /// Drive one pass over `source`, writing accepted clips through `writer`
    ///
    /// Items that are `Err`, records without payload and writer failures are
    /// recorded as `RecordFailure`s; none of them stop the run. Source
    /// exhaustion before the target is reported through the accepted count.
    pub fn run<I, W>(&self, source: I, mut writer: W) -> SampleResult
    where
        I: IntoIterator<Item = Result<SourceRecord>>,
        W: ClipWriter,
    {
        let mut result = SampleResult::new(self.policy.target_count);
        info!(
            "Sampling up to {} clips with prefix {:?}",
            self.policy.target_count, self.spec.prefix
        );

        for (index, item) in source.into_iter().enumerate() {
            result.records_seen += 1;

            let record = match item {
                Ok(record) => record,
                Err(e) => {
                    Self::fail(&mut result, index, e);
                    continue;
                }
            };
            let payload = match record.payload.as_ref() {
                Some(payload) => payload,
                None => {
                    Self::fail(&mut result, index, Error::MissingPayload);
                    continue;
                }
            };

            if let Err(rejection) = self.policy.check(&record) {
                trace!("Record {} rejected: {:?}", index, rejection);
                result.rejected_count += 1;
                continue;
            }

            let filename = self.spec.filename(result.accepted_count());
            match writer.write(&filename, payload) {
                Ok(path) => {
                    let row = self.build_row(filename, path.to_string_lossy().into_owned(), payload, &record);
                    debug!("Accepted record {} as {}", index, row.filename);
                    result.metadata_rows.push(row);
                }
                Err(e) => {
                    Self::fail(&mut result, index, e);
                    continue;
                }
            }

            if result.accepted_count() >= self.policy.target_count {
                break;
            }
        }

        if !result.is_complete() {
            info!(
                "Source exhausted after {} records with {}/{} clips accepted",
                result.records_seen,
                result.accepted_count(),
                result.target_count
            );
        }
        result
    }

    fn fail(result: &mut SampleResult, index: usize, cause: Error) {
        let failure = RecordFailure {
            index,
            reason: cause.to_string(),
        };
        warn!("Skipping {}", failure);
        result.failures.push(failure);
    }

    fn build_row(&self, filename: String, path: String, payload: &Payload, record: &SourceRecord) -> MetadataRow {
        let mut fields: BTreeMap<String, FieldValue> = record
            .label_fields
            .iter()
            .filter(|(key, _)| !RESERVED_COLUMNS.contains(&key.as_str()))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        for (key, value) in &self.spec.extra_fields {
            fields.insert(key.clone(), FieldValue::Text(value.clone()));
        }

        MetadataRow {
            filename,
            label: self.spec.label,
            duration: payload.duration.map(round2),
            path,
            source_name: self.spec.source_name.clone(),
            fields,
        }
    }
}
