//! Persistence of accepted clips

use crate::audio::save_audio;
use crate::record::Payload;
use crate::Result;
use log::debug;
use std::fs;
use std::path::{Path, PathBuf};

/// Persists one payload per call and reports where it landed
pub trait ClipWriter {
    /// Persist one clip
    ///
    /// # Arguments
    ///
    /// * `filename` - Name chosen by the sampler, e.g. `english_3.wav`
    /// * `payload` - Audio to store
    ///
    /// # Returns
    ///
    /// The location the clip was written to
    ///
    /// # Errors
    ///
    /// Any error here is recorded as a failure of the current record; the
    /// sampler moves on to the next one.
    fn write(&mut self, filename: &str, payload: &Payload) -> Result<PathBuf>;
}

impl<W: ClipWriter + ?Sized> ClipWriter for &mut W {
    fn write(&mut self, filename: &str, payload: &Payload) -> Result<PathBuf> {
        (**self).write(filename, payload)
    }
}

/// Writes 16-bit mono WAV files into a single directory
#[derive(Debug, Clone)]
pub struct WavClipWriter {
    dir: PathBuf,
}

impl WavClipWriter {
    /// Create the writer, creating `dir` if it doesn't exist
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created
    pub fn new<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl ClipWriter for WavClipWriter {
    fn write(&mut self, filename: &str, payload: &Payload) -> Result<PathBuf> {
        let path = self.dir.join(filename);
        debug!("Writing {} samples to {:?}", payload.samples.len(), path);
        save_audio(&path, &payload.samples, payload.sample_rate)?;
        Ok(path)
    }
}
