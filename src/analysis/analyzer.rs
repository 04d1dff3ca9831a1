// Analyzer - tempo, key and confidence summary for one waveform
//
// This is what the HTTP service and `beat_cli analyze` report. The waveform
// is analysed at its native rate: tempo from the beat tracker, key from the
// CQT-style chroma, confidence from the spread of the spectral centroid.

use serde::{Deserialize, Serialize};

use crate::audio::Waveform;

use super::beat::beat_track;
use super::features::chroma::CqtChroma;
use super::features::spectral::SpectralFeatures;
use super::features::stft::{Stft, HOP_LENGTH, N_FFT};
use super::key::{confidence_from_centroids, estimate_key};
use super::onset::OnsetDetector;

/// Fixed answers used when no decoder is available
pub const FALLBACK_BPM: i64 = 120;
pub const FALLBACK_KEY: &str = "C Major";
pub const FALLBACK_CONFIDENCE: f64 = 0.3;
pub const FALLBACK_SAMPLE_RATE: u32 = 44100;

/// Estimated seconds of audio per MiB of upload in fallback mode
const FALLBACK_SECS_PER_MIB: f64 = 10.0;

const FALLBACK_NOTE: &str =
    "Audio decoding is unavailable on this server; values are estimates, not measurements";

/// How a result was produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisMethod {
    /// Measured from decoded audio
    Dsp,
    /// Fixed defaults, nothing was decoded
    Fallback,
}

/// Tempo / key summary returned to clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    /// Tempo rounded to the nearest integer
    pub bpm: i64,
    /// e.g. `"A Minor"`
    pub key: String,
    /// 0.0..=0.95, two decimals
    pub confidence: f64,
    pub sample_rate: u32,
    /// Seconds
    pub duration: f64,
    pub analysis_method: AnalysisMethod,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// Analyse a decoded waveform
pub fn analyze_waveform(waveform: &Waveform) -> AnalysisResult {
    let sample_rate = waveform.sample_rate();
    let samples = waveform.samples();

    log::info!("[Analyzer] Detecting BPM...");
    let detector = OnsetDetector::new(sample_rate, N_FFT, HOP_LENGTH);
    let track = beat_track(samples, &detector);

    log::info!("[Analyzer] Detecting musical key...");
    let chroma = CqtChroma::new(sample_rate, HOP_LENGTH).chroma(samples);
    let key = estimate_key(&chroma);

    let spectral = SpectralFeatures::new(sample_rate, N_FFT);
    let centroids: Vec<f32> = Stft::new(N_FFT, HOP_LENGTH)
        .magnitude(samples)
        .iter()
        .map(|frame| spectral.compute_centroid(frame))
        .collect();
    let confidence = confidence_from_centroids(&centroids);

    log::info!(
        "[Analyzer] Analysis complete: {:.1} BPM, {}",
        track.tempo,
        key
    );

    AnalysisResult {
        bpm: track.tempo.round_ties_even() as i64,
        key: key.to_string(),
        confidence: round2(confidence),
        sample_rate,
        duration: waveform.duration_secs(),
        analysis_method: AnalysisMethod::Dsp,
        note: None,
    }
}

/// Fixed result for an upload that could not be decoded
///
/// # Arguments
/// * `file_size_bytes` - Upload size; duration is estimated as 10 s per MiB
pub fn fallback_result(file_size_bytes: u64) -> AnalysisResult {
    AnalysisResult {
        bpm: FALLBACK_BPM,
        key: FALLBACK_KEY.to_string(),
        confidence: FALLBACK_CONFIDENCE,
        sample_rate: FALLBACK_SAMPLE_RATE,
        duration: file_size_bytes as f64 / (1024.0 * 1024.0) * FALLBACK_SECS_PER_MIB,
        analysis_method: AnalysisMethod::Fallback,
        note: Some(FALLBACK_NOTE.to_string()),
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
