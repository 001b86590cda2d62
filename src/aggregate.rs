//! Combining metadata from several runs, or rebuilding it from disk

use crate::audio::wav_duration;
use crate::record::FieldValue;
use crate::sampler::{MetadataRow, SampleResult};
use crate::{Label, Result};
use log::{info, warn};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Concatenate batch results in the order given
pub fn concat<I>(results: I) -> Vec<MetadataRow>
where
    I: IntoIterator<Item = SampleResult>,
{
    results.into_iter().flat_map(SampleResult::into_rows).collect()
}

fn sorted_entries(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut entries = fs::read_dir(dir)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<std::io::Result<Vec<_>>>()?;
    entries.sort();
    Ok(entries)
}

/// Scan `root/<language>/*.wav` and build one row per clip
///
/// Durations come from the WAV headers. Files that aren't WAV are ignored;
/// unreadable WAVs are logged and skipped.
///
/// # Arguments
///
/// * `root` - Dataset directory with one subdirectory per language
/// * `label` - Label stamped on every row
///
/// # Errors
///
/// Returns an error if `root` or one of its subdirectories cannot be listed
pub fn scan_dataset<P: AsRef<Path>>(root: P, label: Label) -> Result<Vec<MetadataRow>> {
    let root = root.as_ref();
    let mut rows = Vec::new();

    for lang_dir in sorted_entries(root)?.into_iter().filter(|p| p.is_dir()) {
        let language = match lang_dir.file_name().and_then(|n| n.to_str()) {
            Some(name) => name.to_string(),
            None => continue,
        };

        for clip in sorted_entries(&lang_dir)? {
            let is_wav = clip.is_file()
                && clip
                    .extension()
                    .and_then(|e| e.to_str())
                    .map_or(false, |e| e.eq_ignore_ascii_case("wav"));
            if !is_wav {
                continue;
            }

            let duration = match wav_duration(&clip) {
                Ok(d) => d,
                Err(e) => {
                    warn!("Skipping {:?}: {}", clip, e);
                    continue;
                }
            };

            let mut fields = BTreeMap::new();
            fields.insert("language".to_string(), FieldValue::Text(language.clone()));
            rows.push(MetadataRow {
                filename: clip
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default(),
                label,
                duration: Some((duration * 100.0).round() / 100.0),
                path: clip.to_string_lossy().into_owned(),
                source_name: String::new(),
                fields,
            });
        }
    }

    info!("Scanned {} clips under {:?}", rows.len(), root);
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::save_audio;
    use ndarray::Array1;
    use tempfile::TempDir;

    #[test]
    fn scans_language_directories_in_order() {
        let tmp = TempDir::new().unwrap();
        for (lang, clips) in [("spanish", 1usize), ("english", 2)] {
            let dir = tmp.path().join(lang);
            fs::create_dir_all(&dir).unwrap();
            for i in 0..clips {
                save_audio(dir.join(format!("{}_{}.wav", lang, i)), &Array1::zeros(8_000 * (i + 1)), 16_000)
                    .unwrap();
            }
        }
        fs::write(tmp.path().join("english").join("notes.txt"), "x").unwrap();
        fs::write(tmp.path().join("english").join("broken.wav"), "not a wav").unwrap();
        fs::write(tmp.path().join("stray.wav"), "top-level files are ignored").unwrap();

        let rows = scan_dataset(tmp.path(), Label::Real).unwrap();

        let names: Vec<_> = rows.iter().map(|r| r.filename.as_str()).collect();
        assert_eq!(names, ["english_0.wav", "english_1.wav", "spanish_0.wav"]);
        assert_eq!(rows[0].duration, Some(0.5));
        assert_eq!(rows[1].duration, Some(1.0));
        assert_eq!(rows[2].fields.get("language"), Some(&FieldValue::from("spanish")));
        assert!(rows.iter().all(|r| r.label == Label::Real));
    }

    #[test]
    fn missing_root_is_an_error() {
        assert!(scan_dataset("/no/such/dataset/root", Label::Real).is_err());
    }
}
