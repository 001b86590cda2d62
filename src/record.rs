//! Records produced by dataset sources
//!
//! A `SourceRecord` is one row of a dataset: an optional audio payload plus a
//! loose bag of label attributes whose keys differ from corpus to corpus.

use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Decoded mono audio for one clip
#[derive(Debug, Clone, PartialEq)]
pub struct Payload {
    /// Mono samples in [-1, 1]
    pub samples: Array1<f32>,
    /// Sampling rate in Hz
    pub sample_rate: u32,
    /// Clip length in seconds, when the source knows it
    pub duration: Option<f64>,
}

impl Payload {
    pub fn new(samples: Array1<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
            duration: None,
        }
    }

    /// Attach a duration computed from the sample count
    pub fn with_measured_duration(mut self) -> Self {
        if self.sample_rate > 0 {
            self.duration = Some(self.samples.len() as f64 / self.sample_rate as f64);
        }
        self
    }

    pub fn with_duration(mut self, duration: f64) -> Self {
        self.duration = Some(duration);
        self
    }
}

/// Value of a single label attribute
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Null,
    Number(f64),
    Text(String),
}

impl FieldValue {
    /// True for null and whitespace-only text
    pub fn is_blank(&self) -> bool {
        match self {
            FieldValue::Null => true,
            FieldValue::Text(s) => s.trim().is_empty(),
            FieldValue::Number(_) => false,
        }
    }

    /// Form used for allow-list comparison and tabular output
    pub fn as_text(&self) -> Option<String> {
        match self {
            FieldValue::Null => None,
            FieldValue::Text(s) => Some(s.clone()),
            FieldValue::Number(n) => Some(n.to_string()),
        }
    }

    /// Map a JSON scalar onto a field value; nested values keep their JSON text
    pub fn from_json(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => FieldValue::Null,
            serde_json::Value::String(s) => FieldValue::Text(s.clone()),
            serde_json::Value::Number(n) => match n.as_f64() {
                Some(f) => FieldValue::Number(f),
                None => FieldValue::Text(n.to_string()),
            },
            serde_json::Value::Bool(b) => FieldValue::Text(b.to_string()),
            other => FieldValue::Text(other.to_string()),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.as_text() {
            Some(s) => f.write_str(&s),
            None => f.write_str("unknown"),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::Text(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::Text(s)
    }
}

impl From<f64> for FieldValue {
    fn from(n: f64) -> Self {
        FieldValue::Number(n)
    }
}

/// One row yielded by a dataset source
#[derive(Debug, Clone, Default)]
pub struct SourceRecord {
    /// Decoded audio; `None` when the row had no usable audio column
    pub payload: Option<Payload>,
    /// Corpus-specific attributes such as accent, transcript or codec name
    pub label_fields: BTreeMap<String, FieldValue>,
}

impl SourceRecord {
    pub fn new(payload: Payload) -> Self {
        Self {
            payload: Some(payload),
            label_fields: BTreeMap::new(),
        }
    }

    /// A record whose audio column was empty or unreadable
    pub fn without_payload() -> Self {
        Self::default()
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.label_fields.insert(key.into(), value.into());
        self
    }

    pub fn field(&self, key: &str) -> Option<&FieldValue> {
        self.label_fields.get(key)
    }

    pub fn duration(&self) -> Option<f64> {
        self.payload.as_ref().and_then(|p| p.duration)
    }
}
