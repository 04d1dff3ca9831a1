// Decoder - load audio files into mono waveforms
//
// WAV files go through hound. Everything else (mp3, flac, m4a/aac) and WAV
// variants hound rejects go through symphonia's probe. Multi-channel audio
// is averaged down to mono, then trimmed to the requested window and
// resampled to the requested rate.

use std::fs::File;
use std::path::Path;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use super::resample::resample_linear;
use super::Waveform;
use crate::config::ExtractionConfig;
use crate::error::AudioError;

/// File extensions accepted by the batch tools (lowercase, without dot)
pub const SUPPORTED_EXTENSIONS: [&str; 5] = ["mp3", "wav", "flac", "m4a", "aac"];

/// How much of a file to load and at what rate
#[derive(Debug, Clone, PartialEq)]
pub struct LoadOptions {
    /// Resample to this rate; `None` keeps the native rate
    pub target_sample_rate: Option<u32>,
    /// Seconds skipped from the start
    pub offset: f64,
    /// Seconds kept after the offset; `None` keeps the rest of the file
    pub duration: Option<f64>,
}

impl LoadOptions {
    /// Native rate, whole file
    pub fn native() -> Self {
        Self {
            target_sample_rate: None,
            offset: 0.0,
            duration: None,
        }
    }

    /// Window and rate used by the feature extractor
    pub fn from_extraction(config: &ExtractionConfig) -> Self {
        Self {
            target_sample_rate: Some(config.sample_rate),
            offset: config.offset,
            duration: config.duration,
        }
    }
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self::native()
    }
}

/// Decoding capability
///
/// Injected into the HTTP service and the extractor so the degraded mode
/// (no decoder) and test doubles need no global state.
pub trait AudioDecoder: Send + Sync {
    /// Short identifier for logs
    fn name(&self) -> &'static str;

    /// Decode `path` into a mono waveform
    fn decode(&self, path: &Path, options: &LoadOptions) -> Result<Waveform, AudioError>;
}

/// Filesystem decoder backed by hound and symphonia
#[derive(Debug, Clone, Copy, Default)]
pub struct FileDecoder;

impl AudioDecoder for FileDecoder {
    fn name(&self) -> &'static str {
        "hound+symphonia"
    }

    fn decode(&self, path: &Path, options: &LoadOptions) -> Result<Waveform, AudioError> {
        load(path, options)
    }
}

/// Decode an audio file into a mono waveform
///
/// # Arguments
/// * `path` - Audio file (wav, mp3, flac, m4a, aac)
/// * `options` - Offset/duration window and optional target rate
///
/// # Errors
/// `FileOpenFailed` if the file cannot be opened, `UnsupportedFormat` if no
/// decoder accepts it, `EmptyAudio` if the window holds no samples
pub fn load(path: &Path, options: &LoadOptions) -> Result<Waveform, AudioError> {
    let is_wav = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("wav"))
        .unwrap_or(false);

    let (mono, sample_rate) = if is_wav {
        match decode_wav(path) {
            Ok(decoded) => decoded,
            Err(AudioError::UnsupportedFormat { reason }) => {
                log::debug!(
                    "[Decoder] hound rejected {} ({}), retrying with symphonia",
                    path.display(),
                    reason
                );
                decode_symphonia(path)?
            }
            Err(err) => return Err(err),
        }
    } else {
        decode_symphonia(path)?
    };

    if sample_rate == 0 {
        return Err(AudioError::InvalidSampleRate { sample_rate });
    }

    let windowed = apply_window(mono, sample_rate, options.offset, options.duration);
    if windowed.is_empty() {
        return Err(AudioError::EmptyAudio);
    }

    let (samples, rate) = match options.target_sample_rate {
        Some(target) if target != sample_rate => {
            (resample_linear(&windowed, sample_rate, target), target)
        }
        _ => (windowed, sample_rate),
    };

    log::debug!(
        "[Decoder] Loaded {}: {} samples at {} Hz",
        path.display(),
        samples.len(),
        rate
    );

    Waveform::new(samples, rate)
}

/// Keep `duration` seconds starting at `offset`
fn apply_window(samples: Vec<f32>, sample_rate: u32, offset: f64, duration: Option<f64>) -> Vec<f32> {
    let start = ((offset.max(0.0)) * sample_rate as f64).round() as usize;
    if start >= samples.len() {
        return Vec::new();
    }
    let end = match duration {
        Some(seconds) => {
            let len = (seconds.max(0.0) * sample_rate as f64).round() as usize;
            start.saturating_add(len).min(samples.len())
        }
        None => samples.len(),
    };

    if start == 0 && end == samples.len() {
        samples
    } else {
        samples[start..end].to_vec()
    }
}

/// Average interleaved frames down to a single channel
fn downmix(interleaved: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return interleaved.to_vec();
    }
    interleaved
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

fn decode_wav(path: &Path) -> Result<(Vec<f32>, u32), AudioError> {
    let mut reader = hound::WavReader::open(path).map_err(|err| match err {
        hound::Error::IoError(io) => AudioError::open_failed(path, io),
        other => AudioError::from(other),
    })?;
    let spec = reader.spec();
    let channels = spec.channels.max(1) as usize;

    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<Result<Vec<_>, _>>()?,
        hound::SampleFormat::Int => {
            let scale = 1.0 / (1u64 << (spec.bits_per_sample.saturating_sub(1))) as f32;
            match spec.bits_per_sample {
                8 => reader
                    .samples::<i8>()
                    .map(|s| s.map(|v| v as f32 * scale))
                    .collect::<Result<Vec<_>, _>>()?,
                16 => reader
                    .samples::<i16>()
                    .map(|s| s.map(|v| v as f32 * scale))
                    .collect::<Result<Vec<_>, _>>()?,
                _ => reader
                    .samples::<i32>()
                    .map(|s| s.map(|v| v as f32 * scale))
                    .collect::<Result<Vec<_>, _>>()?,
            }
        }
    };

    Ok((downmix(&interleaved, channels), spec.sample_rate))
}

fn decode_symphonia(path: &Path) -> Result<(Vec<f32>, u32), AudioError> {
    let file = File::open(path).map_err(|err| AudioError::open_failed(path, err))?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|err| AudioError::UnsupportedFormat {
            reason: err.to_string(),
        })?;
    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| AudioError::UnsupportedFormat {
            reason: "no audio track found".to_string(),
        })?;
    let track_id = track.id;
    let mut sample_rate = track.codec_params.sample_rate.unwrap_or(0);

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(AudioError::from)?;

    let mut mono: Vec<f32> = Vec::new();
    let mut sample_buf: Option<SampleBuffer<f32>> = None;

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break;
            }
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(AudioError::from(e)),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(SymphoniaError::DecodeError(reason)) => {
                log::warn!("[Decoder] Skipping corrupt packet: {}", reason);
                continue;
            }
            Err(e) => return Err(AudioError::from(e)),
        };

        let spec = *decoded.spec();
        if sample_rate == 0 {
            sample_rate = spec.rate;
        }
        let channels = spec.channels.count().max(1);
        let needed = decoded.capacity() * channels;

        if sample_buf
            .as_ref()
            .map_or(true, |buf| buf.capacity() < needed)
        {
            sample_buf = Some(SampleBuffer::new(decoded.capacity() as u64, spec));
        }
        if let Some(buf) = sample_buf.as_mut() {
            buf.copy_interleaved_ref(decoded);
            mono.extend(downmix(buf.samples(), channels));
        }
    }

    Ok((mono, sample_rate))
}
