//! Audio utilities for reading source clips and writing sampled ones
//!
//! WAV input is read with `hound`; any other container (MP3 clips from the
//! crowd-sourced corpora, for instance) goes through `symphonia`. Everything is
//! downmixed to mono f32 in [-1, 1].

use crate::record::Payload;
use crate::{Error, Result};
use ndarray::Array1;
use std::fs::File;
use std::path::Path;
use symphonia::core::{
    audio::SampleBuffer, codecs::DecoderOptions, errors::Error as SymphoniaError,
    formats::FormatOptions, io::MediaSourceStream, meta::MetadataOptions, probe::Hint,
};
use symphonia::default::{get_codecs, get_probe};

fn audio_err<E: std::fmt::Display>(e: E) -> Error {
    Error::AudioProcessing(e.to_string())
}

fn is_wav(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map_or(false, |e| e.eq_ignore_ascii_case("wav"))
}

/// Average interleaved frames down to a single channel
pub fn downmix_to_mono(samples: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return samples.to_vec();
    }
    samples
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
        .collect()
}

/// Read a clip from disk into a mono payload with its measured duration
///
/// # Errors
///
/// Returns an error if:
/// * The file cannot be opened
/// * The container or codec is not supported
/// * A packet fails to decode
pub fn read_audio<P: AsRef<Path>>(path: P) -> Result<Payload> {
    let path = path.as_ref();
    let (samples, sample_rate) = if is_wav(path) {
        read_wav(path)?
    } else {
        decode_compressed(path)?
    };
    Ok(Payload::new(Array1::from_vec(samples), sample_rate).with_measured_duration())
}

fn read_wav(path: &Path) -> Result<(Vec<f32>, u32)> {
    let mut reader = hound::WavReader::open(path).map_err(audio_err)?;
    let spec = reader.spec();

    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .map(|s| s.map_err(audio_err))
            .collect::<Result<Vec<f32>>>()?,
        hound::SampleFormat::Int => {
            let scale = (1i64 << (spec.bits_per_sample.saturating_sub(1) as u32)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map_err(audio_err))
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<Result<Vec<f32>>>()?
        }
    };

    Ok((
        downmix_to_mono(&interleaved, spec.channels as usize),
        spec.sample_rate,
    ))
}

fn decode_compressed(path: &Path) -> Result<(Vec<f32>, u32)> {
    let file = File::open(path)?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(audio_err)?;
    let mut format = probed.format;
    let track = format
        .default_track()
        .ok_or_else(|| Error::AudioProcessing(format!("no audio track in {:?}", path)))?;
    let track_id = track.id;
    let mut decoder = get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(audio_err)?;

    let mut samples = Vec::new();
    let mut sample_rate = track.codec_params.sample_rate.unwrap_or(0);

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(ref e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break
            }
            Err(e) => return Err(audio_err(e)),
        };
        if packet.track_id() != track_id {
            continue;
        }

        let decoded = decoder.decode(&packet).map_err(audio_err)?;
        let spec = *decoded.spec();
        sample_rate = spec.rate;

        let mut buffer = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
        buffer.copy_interleaved_ref(decoded);
        samples.extend(downmix_to_mono(buffer.samples(), spec.channels.count()));
    }

    if sample_rate == 0 {
        return Err(Error::AudioProcessing(format!(
            "could not determine sample rate of {:?}",
            path
        )));
    }

    Ok((samples, sample_rate))
}

/// Save mono audio to a 16-bit PCM WAV file
///
/// # Errors
///
/// Returns an error if:
/// * The file cannot be created
/// * The audio data cannot be written
/// * The WAV file cannot be finalized
pub fn save_audio<P: AsRef<Path>>(path: P, audio: &Array1<f32>, sampling_rate: u32) -> Result<()> {
    if sampling_rate == 0 {
        return Err(Error::AudioProcessing("sample rate must be positive".into()));
    }

    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: sampling_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer = hound::WavWriter::create(path, spec).map_err(audio_err)?;

    for &sample in audio.iter() {
        let sample = (sample * 32768.0).clamp(-32768.0, 32767.0) as i16;
        writer.write_sample(sample).map_err(audio_err)?;
    }

    writer.finalize().map_err(audio_err)?;

    Ok(())
}

/// Duration in seconds of a WAV file, read from its header
pub fn wav_duration<P: AsRef<Path>>(path: P) -> Result<f64> {
    let reader = hound::WavReader::open(path).map_err(audio_err)?;
    let spec = reader.spec();
    if spec.sample_rate == 0 {
        return Err(Error::AudioProcessing("WAV header has zero sample rate".into()));
    }
    Ok(reader.duration() as f64 / spec.sample_rate as f64)
}
