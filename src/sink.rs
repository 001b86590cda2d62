//! Serialization of metadata rows to tabular files

use crate::sampler::{MetadataRow, RESERVED_COLUMNS as FIXED_COLUMNS};
use crate::{Error, Result};
use log::info;
use std::collections::BTreeSet;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

/// Placeholder for absent or null label fields
pub const UNKNOWN: &str = "unknown";

/// Header shared by all rows: fixed columns, then every field key in sorted order
pub fn columns(rows: &[MetadataRow]) -> Vec<String> {
    let extra: BTreeSet<&str> = rows
        .iter()
        .flat_map(|row| row.fields.keys().map(String::as_str))
        .collect();
    FIXED_COLUMNS
        .iter()
        .copied()
        .chain(extra)
        .map(str::to_string)
        .collect()
}

/// Write rows as CSV to any writer
pub fn write_csv_to<W: Write>(out: W, rows: &[MetadataRow]) -> Result<()> {
    let header = columns(rows);
    let mut writer = csv::Writer::from_writer(out);
    writer.write_record(&header)?;

    for row in rows {
        let mut record = vec![
            row.filename.clone(),
            row.label.to_string(),
            row.duration.map(|d| d.to_string()).unwrap_or_default(),
            row.path.clone(),
            row.source_name.clone(),
        ];
        for key in &header[FIXED_COLUMNS.len()..] {
            record.push(
                row.fields
                    .get(key)
                    .and_then(|v| v.as_text())
                    .unwrap_or_else(|| UNKNOWN.to_string()),
            );
        }
        writer.write_record(&record)?;
    }

    writer.flush()?;
    Ok(())
}

fn create_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

/// Write rows as CSV, creating parent directories as needed
pub fn write_csv<P: AsRef<Path>>(path: P, rows: &[MetadataRow]) -> Result<()> {
    let path = path.as_ref();
    create_parent(path)?;
    write_csv_to(BufWriter::new(File::create(path)?), rows)
}

/// Write rows as a pretty-printed JSON array
pub fn write_json<P: AsRef<Path>>(path: P, rows: &[MetadataRow]) -> Result<()> {
    let path = path.as_ref();
    create_parent(path)?;
    let mut out = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut out, rows)?;
    out.write_all(b"\n")?;
    out.flush()?;
    Ok(())
}

/// Write rows in the format implied by the file extension (`.json`, else CSV)
pub fn write_metadata<P: AsRef<Path>>(path: P, rows: &[MetadataRow]) -> Result<()> {
    let path = path.as_ref();
    if rows.is_empty() {
        return Err(Error::InvalidRecord(format!(
            "no rows to write to {:?}",
            path
        )));
    }
    let is_json = path
        .extension()
        .and_then(|e| e.to_str())
        .map_or(false, |e| e.eq_ignore_ascii_case("json"));
    if is_json {
        write_json(path, rows)?;
    } else {
        write_csv(path, rows)?;
    }
    info!("Saved {} metadata rows to {:?}", rows.len(), path);
    Ok(())
}
