// Mel module - Mel filterbank, log power and cepstral coefficients
//
// The filterbank uses the Slaney mel scale (linear below 1 kHz, logarithmic
// above) with triangular, area-normalised filters spanning 0 Hz to Nyquist.
// MFCCs are the orthonormal DCT-II of the dB mel spectrogram.

use std::f64::consts::PI;

use super::spectral::AMIN;
use super::stft::{bin_frequencies, Spectrogram};

/// Dynamic range kept by `power_to_db`
pub const TOP_DB: f32 = 80.0;

/// Width of the delta regression window (frames)
pub const DELTA_WIDTH: usize = 9;

const F_SP: f64 = 200.0 / 3.0;
const MIN_LOG_HZ: f64 = 1000.0;
const MIN_LOG_MEL: f64 = MIN_LOG_HZ / F_SP;

fn log_step() -> f64 {
    6.4f64.ln() / 27.0
}

/// Hz → mel (Slaney)
pub fn hz_to_mel(hz: f64) -> f64 {
    if hz >= MIN_LOG_HZ {
        MIN_LOG_MEL + (hz / MIN_LOG_HZ).ln() / log_step()
    } else {
        hz / F_SP
    }
}

/// Mel → Hz (Slaney)
pub fn mel_to_hz(mel: f64) -> f64 {
    if mel >= MIN_LOG_MEL {
        MIN_LOG_HZ * (log_step() * (mel - MIN_LOG_MEL)).exp()
    } else {
        mel * F_SP
    }
}

/// Triangular mel filterbank (`n_mels` × `n_fft/2 + 1`)
pub struct MelFilterbank {
    weights: Vec<Vec<f32>>,
}

impl MelFilterbank {
    /// Build the filterbank
    ///
    /// # Arguments
    /// * `sample_rate` - Audio sample rate in Hz
    /// * `n_fft` - FFT size the spectra come from
    /// * `n_mels` - Number of mel bands
    pub fn new(sample_rate: u32, n_fft: usize, n_mels: usize) -> Self {
        let fft_freqs = bin_frequencies(sample_rate, n_fft);
        let mel_max = hz_to_mel(sample_rate as f64 / 2.0);
        let mel_points: Vec<f64> = (0..n_mels + 2)
            .map(|i| mel_to_hz(mel_max * i as f64 / (n_mels + 1) as f64))
            .collect();

        let weights = (0..n_mels)
            .map(|m| {
                let (lower, centre, upper) = (mel_points[m], mel_points[m + 1], mel_points[m + 2]);
                let enorm = 2.0 / (upper - lower);
                fft_freqs
                    .iter()
                    .map(|&f| {
                        let f = f as f64;
                        let rising = (f - lower) / (centre - lower);
                        let falling = (upper - f) / (upper - centre);
                        (rising.min(falling).max(0.0) * enorm) as f32
                    })
                    .collect()
            })
            .collect();

        Self { weights }
    }

    pub fn n_mels(&self) -> usize {
        self.weights.len()
    }

    /// Project one power spectrum frame onto the mel bands
    pub fn apply(&self, spectrum: &[f32]) -> Vec<f32> {
        self.weights
            .iter()
            .map(|filter| filter.iter().zip(spectrum.iter()).map(|(w, s)| w * s).sum())
            .collect()
    }

    /// Mel power spectrogram from a power spectrogram
    pub fn melspectrogram(&self, power: &Spectrogram) -> Spectrogram {
        power.iter().map(|frame| self.apply(frame)).collect()
    }
}

/// Convert a power spectrogram to dB
///
/// `10 * log10(max(S, 1e-10))` relative to 1.0, then clipped to
/// `TOP_DB` below the global peak.
pub fn power_to_db(power: &Spectrogram) -> Spectrogram {
    let mut db: Spectrogram = power
        .iter()
        .map(|frame| frame.iter().map(|&p| 10.0 * p.max(AMIN).log10()).collect())
        .collect();
    let peak = db
        .iter()
        .flat_map(|frame| frame.iter().copied())
        .fold(f32::NEG_INFINITY, f32::max);
    if peak.is_finite() {
        let floor = peak - TOP_DB;
        for value in db.iter_mut().flat_map(|frame| frame.iter_mut()) {
            *value = value.max(floor);
        }
    }
    db
}

/// Orthonormal DCT-II matrix (`n_out` × `n_in`)
fn dct_matrix(n_out: usize, n_in: usize) -> Vec<Vec<f32>> {
    let n = n_in as f64;
    (0..n_out)
        .map(|k| {
            let scale = if k == 0 { (1.0 / n).sqrt() } else { (2.0 / n).sqrt() };
            (0..n_in)
                .map(|i| (scale * (PI * k as f64 * (2 * i + 1) as f64 / (2.0 * n)).cos()) as f32)
                .collect()
        })
        .collect()
}

/// MFCCs from a mel power spectrogram
///
/// # Returns
/// Frame-major matrix of `n_mfcc` coefficients per frame
pub fn mfcc(mel_power: &Spectrogram, n_mfcc: usize) -> Spectrogram {
    let log_mel = power_to_db(mel_power);
    let n_mels = log_mel.first().map(Vec::len).unwrap_or(0);
    let dct = dct_matrix(n_mfcc, n_mels);
    log_mel
        .iter()
        .map(|frame| {
            dct.iter()
                .map(|basis| basis.iter().zip(frame.iter()).map(|(b, x)| b * x).sum())
                .collect()
        })
        .collect()
}

/// Local derivative of each coefficient trajectory
///
/// Savitzky–Golay estimate over a 9-frame window. Order 1 fits a line,
/// order 2 fits a parabola and returns its second derivative. Edges repeat
/// the first and last frame.
///
/// # Arguments
/// * `features` - Frame-major matrix
/// * `order` - 1 or 2
pub fn delta(features: &Spectrogram, order: usize) -> Spectrogram {
    let half = (DELTA_WIDTH / 2) as isize;
    let offsets: Vec<f64> = (-half..=half).map(|k| k as f64).collect();
    let coefficients: Vec<f64> = match order {
        1 => {
            let denom: f64 = offsets.iter().map(|k| k * k).sum();
            offsets.iter().map(|k| k / denom).collect()
        }
        _ => {
            let mean_sq = offsets.iter().map(|k| k * k).sum::<f64>() / offsets.len() as f64;
            let centred: Vec<f64> = offsets.iter().map(|k| k * k - mean_sq).collect();
            let denom: f64 = centred.iter().map(|c| c * c).sum();
            centred.iter().map(|c| 2.0 * c / denom).collect()
        }
    };

    let n_frames = features.len() as isize;
    (0..n_frames)
        .map(|t| {
            let n_coeffs = features[t as usize].len();
            (0..n_coeffs)
                .map(|c| {
                    offsets
                        .iter()
                        .zip(coefficients.iter())
                        .map(|(&k, &w)| {
                            let idx = (t + k as isize).clamp(0, n_frames - 1) as usize;
                            w * features[idx][c] as f64
                        })
                        .sum::<f64>() as f32
                })
                .collect()
        })
        .collect()
}
