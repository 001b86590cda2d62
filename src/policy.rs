//! Acceptance predicates applied to every source record
//!
//! The lower duration bound is always inclusive. The upper bound is inclusive
//! unless the policy sets `upper_bound` to `BoundKind::Exclusive`.

use crate::record::SourceRecord;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// How the upper duration bound treats a clip of exactly `max_duration`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BoundKind {
    #[default]
    Inclusive,
    Exclusive,
}

/// Why a record was skipped without being written
#[derive(Debug, Clone, PartialEq)]
pub enum Rejection {
    MissingDuration,
    TooShort(f64),
    TooLong(f64),
    BlankField(String),
    DisallowedValue { field: String, value: Option<String> },
}

/// Predicates a record must satisfy to be kept
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcceptancePolicy {
    /// Shortest accepted clip in seconds
    #[serde(default)]
    pub min_duration: Option<f64>,
    /// Longest accepted clip in seconds
    #[serde(default)]
    pub max_duration: Option<f64>,
    #[serde(default)]
    pub upper_bound: BoundKind,
    /// Fields that must be present and non-blank
    #[serde(default)]
    pub required_fields: BTreeSet<String>,
    /// Per-field allow-lists; an empty set places no restriction
    #[serde(default)]
    pub allowed_values: BTreeMap<String, BTreeSet<String>>,
    /// Number of clips to keep before stopping
    pub target_count: usize,
}

impl AcceptancePolicy {
    /// A policy that accepts everything up to `target_count` records
    pub fn new(target_count: usize) -> Self {
        Self {
            min_duration: None,
            max_duration: None,
            upper_bound: BoundKind::Inclusive,
            required_fields: BTreeSet::new(),
            allowed_values: BTreeMap::new(),
            target_count,
        }
    }

    pub fn with_duration_bounds(mut self, min: Option<f64>, max: Option<f64>) -> Self {
        self.min_duration = min;
        self.max_duration = max;
        self
    }

    pub fn with_upper_bound(mut self, kind: BoundKind) -> Self {
        self.upper_bound = kind;
        self
    }

    pub fn require(mut self, field: impl Into<String>) -> Self {
        self.required_fields.insert(field.into());
        self
    }

    pub fn allow<I, S>(mut self, field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_values
            .entry(field.into())
            .or_default()
            .extend(values.into_iter().map(Into::into));
        self
    }

    fn has_duration_bounds(&self) -> bool {
        self.min_duration.is_some() || self.max_duration.is_some()
    }

    /// Reject malformed policies before a run performs any I/O
    pub fn validate(&self) -> Result<()> {
        if self.target_count == 0 {
            return Err(Error::InvalidConfig("target_count must be positive".into()));
        }
        for (name, bound) in [("min_duration", self.min_duration), ("max_duration", self.max_duration)] {
            if let Some(b) = bound {
                if !b.is_finite() || b < 0.0 {
                    return Err(Error::InvalidConfig(format!(
                        "{} must be a finite, non-negative number of seconds, got {}",
                        name, b
                    )));
                }
            }
        }
        if let (Some(min), Some(max)) = (self.min_duration, self.max_duration) {
            if min > max {
                return Err(Error::InvalidConfig(format!(
                    "min_duration ({}) is greater than max_duration ({})",
                    min, max
                )));
            }
            if min == max && self.upper_bound == BoundKind::Exclusive {
                return Err(Error::InvalidConfig(format!(
                    "duration range [{}, {}) is empty",
                    min, max
                )));
            }
        }
        Ok(())
    }

    fn check_duration(&self, duration: Option<f64>) -> std::result::Result<(), Rejection> {
        if !self.has_duration_bounds() {
            return Ok(());
        }
        let duration = match duration {
            Some(d) if d.is_finite() => d,
            _ => return Err(Rejection::MissingDuration),
        };
        if let Some(min) = self.min_duration {
            if duration < min {
                return Err(Rejection::TooShort(duration));
            }
        }
        if let Some(max) = self.max_duration {
            let over = match self.upper_bound {
                BoundKind::Inclusive => duration > max,
                BoundKind::Exclusive => duration >= max,
            };
            if over {
                return Err(Rejection::TooLong(duration));
            }
        }
        Ok(())
    }

    /// Evaluate all predicates in order: duration, required fields, allow-lists
    pub fn check(&self, record: &SourceRecord) -> std::result::Result<(), Rejection> {
        self.check_duration(record.duration())?;

        for field in &self.required_fields {
            match record.field(field) {
                Some(value) if !value.is_blank() => {}
                _ => return Err(Rejection::BlankField(field.clone())),
            }
        }

        for (field, allowed) in &self.allowed_values {
            if allowed.is_empty() {
                continue;
            }
            let value = record.field(field).and_then(|v| v.as_text());
            let permitted = value.as_deref().map_or(false, |v| allowed.contains(v));
            if !permitted {
                return Err(Rejection::DisallowedValue {
                    field: field.clone(),
                    value,
                });
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{FieldValue, Payload};
    use ndarray::Array1;

    fn clip(duration: f64) -> SourceRecord {
        SourceRecord::new(Payload::new(Array1::zeros(4), 16_000).with_duration(duration))
    }

    #[test]
    fn inclusive_bounds_accept_both_edges() {
        let policy = AcceptancePolicy::new(1).with_duration_bounds(Some(1.0), Some(10.0));
        assert_eq!(policy.check(&clip(1.0)), Ok(()));
        assert_eq!(policy.check(&clip(10.0)), Ok(()));
        assert_eq!(policy.check(&clip(0.99)), Err(Rejection::TooShort(0.99)));
        assert_eq!(policy.check(&clip(10.01)), Err(Rejection::TooLong(10.01)));
    }

    #[test]
    fn exclusive_upper_bound_rejects_max() {
        let policy = AcceptancePolicy::new(1)
            .with_duration_bounds(Some(1.0), Some(10.0))
            .with_upper_bound(BoundKind::Exclusive);
        assert_eq!(policy.check(&clip(1.0)), Ok(()));
        assert_eq!(policy.check(&clip(9.999)), Ok(()));
        assert_eq!(policy.check(&clip(10.0)), Err(Rejection::TooLong(10.0)));
    }

    #[test]
    fn missing_duration_rejected_only_when_bounded() {
        let record = SourceRecord::new(Payload::new(Array1::zeros(4), 16_000));
        assert_eq!(AcceptancePolicy::new(1).check(&record), Ok(()));

        let bounded = AcceptancePolicy::new(1).with_duration_bounds(None, Some(5.0));
        assert_eq!(bounded.check(&record), Err(Rejection::MissingDuration));
    }

    #[test]
    fn required_fields_must_be_non_blank() {
        let policy = AcceptancePolicy::new(1).require("transcript");
        assert_eq!(
            policy.check(&clip(2.0)),
            Err(Rejection::BlankField("transcript".into()))
        );
        assert_eq!(
            policy.check(&clip(2.0).with_field("transcript", FieldValue::Null)),
            Err(Rejection::BlankField("transcript".into()))
        );
        assert_eq!(
            policy.check(&clip(2.0).with_field("transcript", " \t ")),
            Err(Rejection::BlankField("transcript".into()))
        );
        assert_eq!(policy.check(&clip(2.0).with_field("transcript", "hello")), Ok(()));
    }

    #[test]
    fn allow_list_filters_values() {
        let policy = AcceptancePolicy::new(1).allow("accent", ["us", "england"]);
        assert_eq!(policy.check(&clip(2.0).with_field("accent", "us")), Ok(()));
        assert_eq!(
            policy.check(&clip(2.0).with_field("accent", "scotland")),
            Err(Rejection::DisallowedValue {
                field: "accent".into(),
                value: Some("scotland".into())
            })
        );
        assert_eq!(
            policy.check(&clip(2.0)),
            Err(Rejection::DisallowedValue {
                field: "accent".into(),
                value: None
            })
        );
    }

    #[test]
    fn allow_list_matches_numbers_by_printed_form() {
        let policy = AcceptancePolicy::new(1).allow("speaker_id", ["7", "12.5"]);
        assert_eq!(policy.check(&clip(2.0).with_field("speaker_id", 7.0)), Ok(()));
        assert_eq!(policy.check(&clip(2.0).with_field("speaker_id", 12.5)), Ok(()));
        assert_eq!(
            policy.check(&clip(2.0).with_field("speaker_id", 8.0)),
            Err(Rejection::DisallowedValue {
                field: "speaker_id".into(),
                value: Some("8".into())
            })
        );
        assert_eq!(
            policy.check(&clip(2.0).with_field("speaker_id", FieldValue::Null)),
            Err(Rejection::DisallowedValue {
                field: "speaker_id".into(),
                value: None
            })
        );
    }

    #[test]
    fn empty_allow_list_accepts_everything() {
        let policy = AcceptancePolicy::new(1).allow("accent", Vec::<String>::new());
        assert!(policy.allowed_values.contains_key("accent"));
        assert_eq!(policy.check(&clip(2.0)), Ok(()));
        assert_eq!(policy.check(&clip(2.0).with_field("accent", "anything")), Ok(()));
    }

    #[test]
    fn validation_catches_fatal_configurations() {
        assert!(AcceptancePolicy::new(0).validate().is_err());
        assert!(AcceptancePolicy::new(3)
            .with_duration_bounds(Some(5.0), Some(1.0))
            .validate()
            .is_err());
        assert!(AcceptancePolicy::new(3)
            .with_duration_bounds(Some(f64::NAN), None)
            .validate()
            .is_err());
        assert!(AcceptancePolicy::new(3)
            .with_duration_bounds(Some(2.0), Some(2.0))
            .with_upper_bound(BoundKind::Exclusive)
            .validate()
            .is_err());
        assert!(AcceptancePolicy::new(3)
            .with_duration_bounds(Some(2.0), Some(2.0))
            .validate()
            .is_ok());
    }

    #[test]
    fn deserializes_with_defaults() {
        let policy: AcceptancePolicy =
            serde_json::from_str(r#"{"max_duration": 10.0, "upper_bound": "exclusive", "target_count": 5}"#)
                .unwrap();
        assert_eq!(policy.min_duration, None);
        assert_eq!(policy.upper_bound, BoundKind::Exclusive);
        assert!(policy.required_fields.is_empty());
        assert_eq!(policy.target_count, 5);
    }
}
