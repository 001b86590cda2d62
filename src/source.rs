//! Local dataset sources
//!
//! Both sources are lazy: a row is parsed and its audio decoded only when the
//! sampler asks for the next record. Row-level problems surface as `Err` items
//! so the sampler can skip them without ending the run.

use crate::audio::read_audio;
use crate::record::{FieldValue, Payload, SourceRecord};
use crate::{Error, Result};
use log::debug;
use ndarray::Array1;
use serde_json::{Map, Value};
use std::fs::File;
use std::io::{BufRead, BufReader, ErrorKind, Lines};
use std::path::{Path, PathBuf};

/// JSON-lines manifest, one object per clip
///
/// The `audio` key is either a path (relative to the manifest's directory) or
/// an object `{"array": [...], "sampling_rate": 16000}` holding the samples
/// inline. An optional `duration` overrides the measured one. Every other key
/// becomes a label field.
pub struct ManifestSource {
    lines: Lines<BufReader<File>>,
    /// Directory that relative `audio` paths are resolved against
    base_dir: PathBuf,
    /// 1-based line number of the most recently read line
    line_no: usize,
    /// Set after an unrecoverable read error
    done: bool,
}

impl ManifestSource {
    /// Open a JSON-lines manifest
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the manifest file; relative clip paths inside it are
    ///            resolved against its parent directory
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// * The path does not exist or cannot be opened
    /// * The path is not a regular file
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        if !file.metadata()?.is_file() {
            return Err(Error::InvalidConfig(format!(
                "manifest {:?} is not a regular file",
                path
            )));
        }
        let base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        debug!("Opened manifest {:?}", path);
        Ok(Self {
            lines: BufReader::new(file).lines(),
            base_dir,
            line_no: 0,
            done: false,
        })
    }

    fn parse_line(&self, line: &str) -> Result<SourceRecord> {
        let mut object: Map<String, Value> = serde_json::from_str(line).map_err(|e| {
            Error::InvalidRecord(format!("manifest line {}: {}", self.line_no, e))
        })?;

        let declared_duration = match object.remove("duration") {
            None | Some(Value::Null) => None,
            Some(Value::Number(n)) => n.as_f64(),
            Some(other) => {
                return Err(Error::InvalidRecord(format!(
                    "manifest line {}: duration must be a number, got {}",
                    self.line_no, other
                )))
            }
        };

        let payload = match object.remove("audio") {
            None | Some(Value::Null) => None,
            Some(Value::String(rel)) => Some(read_audio(self.base_dir.join(rel))?),
            Some(Value::Object(inline)) => Some(inline_payload(&inline)?),
            Some(other) => {
                return Err(Error::InvalidRecord(format!(
                    "manifest line {}: unsupported audio value {}",
                    self.line_no, other
                )))
            }
        };

        let payload = match (payload, declared_duration) {
            (Some(p), Some(d)) => Some(p.with_duration(d)),
            (payload, _) => payload,
        };

        Ok(SourceRecord {
            payload,
            label_fields: object
                .iter()
                .map(|(k, v)| (k.clone(), FieldValue::from_json(v)))
                .collect(),
        })
    }
}

fn inline_payload(audio: &Map<String, Value>) -> Result<Payload> {
    let samples = audio
        .get("array")
        .and_then(Value::as_array)
        .ok_or_else(|| Error::InvalidRecord("inline audio has no sample array".into()))?
        .iter()
        .map(|v| {
            v.as_f64()
                .map(|s| s as f32)
                .ok_or_else(|| Error::InvalidRecord(format!("non-numeric sample {}", v)))
        })
        .collect::<Result<Vec<f32>>>()?;
    let sample_rate = audio
        .get("sampling_rate")
        .and_then(Value::as_u64)
        .and_then(|sr| u32::try_from(sr).ok())
        .filter(|&sr| sr > 0)
        .ok_or_else(|| Error::InvalidRecord("inline audio has no valid sampling_rate".into()))?;

    Ok(Payload::new(Array1::from_vec(samples), sample_rate).with_measured_duration())
}

impl Iterator for ManifestSource {
    type Item = Result<SourceRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        loop {
            self.line_no += 1;
            let line = match self.lines.next()? {
                Ok(line) => line,
                // A line that isn't UTF-8 is one bad record; anything else ends the stream.
                Err(e) if e.kind() == ErrorKind::InvalidData => {
                    return Some(Err(Error::InvalidRecord(format!(
                        "manifest line {}: {}",
                        self.line_no, e
                    ))))
                }
                Err(e) => {
                    self.done = true;
                    return Some(Err(e.into()));
                }
            };
            if line.trim().is_empty() {
                continue;
            }
            return Some(self.parse_line(&line));
        }
    }
}

/// Tab-separated Common Voice release (`train.tsv` next to a `clips/` folder)
///
/// Column names are normalised: `sentence` becomes `transcript`, `accent` or
/// `accents` becomes `accent`, `locale` becomes `language` and `client_id`
/// becomes `speaker_id`. Empty cells are null. When two columns map to the
/// same field, the first non-empty one wins.
pub struct CommonVoiceSource {
    reader: csv::Reader<File>,
    /// Header row, kept to name each cell
    headers: csv::StringRecord,
    /// Directory holding the files named in the `path` column
    clips_dir: PathBuf,
    /// Set after an I/O error or the end of the file
    done: bool,
}

impl CommonVoiceSource {
    /// Open a Common Voice TSV file
    ///
    /// # Arguments
    ///
    /// * `tsv` - Path to the tab-separated split file (e.g. `train.tsv`)
    /// * `clips_dir` - Directory the `path` column is relative to
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// * The file cannot be opened or its header cannot be read
    /// * The header has no `path` column
    pub fn open<P: AsRef<Path>, Q: AsRef<Path>>(tsv: P, clips_dir: Q) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .quoting(false)
            .flexible(true)
            .has_headers(true)
            .from_path(tsv.as_ref())?;
        let headers = reader.headers()?.clone();
        if !headers.iter().any(|h| h == "path") {
            return Err(Error::InvalidConfig(format!(
                "{:?} has no \"path\" column",
                tsv.as_ref()
            )));
        }
        Ok(Self {
            reader,
            headers,
            clips_dir: clips_dir.as_ref().to_path_buf(),
            done: false,
        })
    }

    fn field_name(column: &str) -> &str {
        match column {
            "sentence" => "transcript",
            "accent" | "accents" => "accent",
            "locale" => "language",
            "client_id" => "speaker_id",
            other => other,
        }
    }

    fn to_record(&self, row: &csv::StringRecord) -> Result<SourceRecord> {
        let mut record = SourceRecord::without_payload();
        for (column, cell) in self.headers.iter().zip(row.iter()) {
            let cell = cell.trim();
            if column == "path" {
                if !cell.is_empty() {
                    record.payload = Some(read_audio(self.clips_dir.join(cell))?);
                }
                continue;
            }
            let value = if cell.is_empty() {
                FieldValue::Null
            } else {
                FieldValue::from(cell)
            };
            // Aliased columns (`accent` and `accents`) keep the first non-empty value.
            let key = Self::field_name(column);
            match record.label_fields.get(key) {
                Some(existing) if !existing.is_blank() => {}
                _ => {
                    record.label_fields.insert(key.to_string(), value);
                }
            }
        }
        Ok(record)
    }
}

impl Iterator for CommonVoiceSource {
    type Item = Result<SourceRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let mut row = csv::StringRecord::new();
        match self.reader.read_record(&mut row) {
            Ok(true) => Some(self.to_record(&row)),
            Ok(false) => {
                self.done = true;
                None
            }
            Err(e) => {
                if matches!(e.kind(), csv::ErrorKind::Io(_)) {
                    self.done = true;
                }
                Some(Err(e.into()))
            }
        }
    }
}
