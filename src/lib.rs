pub mod aggregate;
pub mod audio;
pub mod batch;
pub mod config;
pub mod policy;
pub mod record;
pub mod sampler;
pub mod sink;
pub mod source;
pub mod writer;

pub use policy::{AcceptancePolicy, BoundKind, Rejection};
pub use record::{FieldValue, Payload, SourceRecord};
pub use sampler::{MetadataRow, RecordFailure, RunSpec, SampleResult, Sampler};
pub use writer::{ClipWriter, WavClipWriter};

use serde::{Deserialize, Serialize};

/// Provenance label attached to every clip
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Label {
    Real,
    Fake,
}

impl Label {
    pub fn as_str(&self) -> &'static str {
        match self {
            Label::Real => "real",
            Label::Fake => "fake",
        }
    }
}

impl std::fmt::Display for Label {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Label {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "real" => Ok(Label::Real),
            "fake" => Ok(Label::Fake),
            other => Err(Error::InvalidConfig(format!(
                "label must be \"real\" or \"fake\", got {:?}",
                other
            ))),
        }
    }
}

/// Error types for the speech-subset library
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("Record has no audio payload")]
    MissingPayload,
    #[error("Invalid record: {0}")]
    InvalidRecord(String),
    #[error("Audio processing error: {0}")]
    AudioProcessing(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// Result type for the speech-subset library
pub type Result<T> = std::result::Result<T, Error>;
