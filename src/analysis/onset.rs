// OnsetDetector - mel spectral flux onset envelope and peak picking
//
// This module computes an onset strength envelope from the log-power mel
// spectrogram and picks onset frames from it.
//
// Algorithm:
// 1. Power STFT (2048 / 512, centred) → 128-band mel → dB
// 2. Positive difference from the previous frame: SF[b] = max(0, M_t[b] - M_(t-1)[b])
// 3. Mean across bands: flux_t = mean_b SF[b]
// 4. Shift right by 1 + n_fft / (2 * hop) frames to undo the centring lag
// 5. Peak pick on the [0, 1]-normalised envelope: local maximum over
//    ±30 ms, at least 0.07 above the mean over the surrounding 100 ms, and
//    at least 30 ms after the previous onset

use super::features::mel::{power_to_db, MelFilterbank};
use super::features::stft::{Spectrogram, Stft};

/// Mel bands used for the onset envelope
const ONSET_N_MELS: usize = 128;

/// Peak picking window before/after the candidate (seconds)
const PEAK_MAX_SECS: f32 = 0.03;

/// Moving-average window on each side (seconds)
const PEAK_AVG_SECS: f32 = 0.10;

/// Minimum gap between onsets (seconds)
const PEAK_WAIT_SECS: f32 = 0.03;

/// Threshold above the local average
const PEAK_DELTA: f32 = 0.07;

/// Peak picking windows in frames
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PeakPickParams {
    pub pre_max: usize,
    pub post_max: usize,
    pub pre_avg: usize,
    pub post_avg: usize,
    pub wait: usize,
    pub delta: f32,
}

impl PeakPickParams {
    /// Windows for a given frame rate
    pub fn for_rate(sample_rate: u32, hop: usize) -> Self {
        let frames = |secs: f32| (secs * sample_rate as f32 / hop as f32).floor() as usize;
        Self {
            pre_max: frames(PEAK_MAX_SECS),
            post_max: 1,
            pre_avg: frames(PEAK_AVG_SECS),
            post_avg: frames(PEAK_AVG_SECS) + 1,
            wait: frames(PEAK_WAIT_SECS),
            delta: PEAK_DELTA,
        }
    }
}

/// OnsetDetector computes onset envelopes and onset frames for whole signals
pub struct OnsetDetector {
    sample_rate: u32,
    stft: Stft,
    mel: MelFilterbank,
}

impl OnsetDetector {
    /// Create a detector
    ///
    /// # Arguments
    /// * `sample_rate` - Audio sample rate in Hz
    /// * `n_fft` - STFT size (typically 2048)
    /// * `hop` - Hop between frames (typically 512)
    pub fn new(sample_rate: u32, n_fft: usize, hop: usize) -> Self {
        Self {
            sample_rate,
            stft: Stft::new(n_fft, hop),
            mel: MelFilterbank::new(sample_rate, n_fft, ONSET_N_MELS),
        }
    }

    pub fn hop(&self) -> usize {
        self.stft.hop()
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Onset strength envelope, one value per STFT frame
    pub fn strength(&self, samples: &[f32]) -> Vec<f32> {
        let mel_db = power_to_db(&self.mel.melspectrogram(&self.stft.power(samples)));
        onset_strength(&mel_db, self.stft.n_fft(), self.stft.hop())
    }

    /// Onset frames picked from an envelope
    pub fn detect(&self, envelope: &[f32]) -> Vec<usize> {
        if envelope.iter().all(|&v| v == 0.0) {
            return Vec::new();
        }
        let min = envelope.iter().copied().fold(f32::INFINITY, f32::min);
        let max = envelope.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        let range = (max - min) + f32::MIN_POSITIVE;
        let normalised: Vec<f32> = envelope.iter().map(|&v| (v - min) / range).collect();
        pick_peaks(&normalised, PeakPickParams::for_rate(self.sample_rate, self.hop()))
    }

    /// Frame indices → seconds
    pub fn frames_to_time(&self, frames: &[usize]) -> Vec<f64> {
        frames_to_time(frames, self.sample_rate, self.hop())
    }
}

/// Frame indices → seconds for a given rate and hop
pub fn frames_to_time(frames: &[usize], sample_rate: u32, hop: usize) -> Vec<f64> {
    frames
        .iter()
        .map(|&f| (f * hop) as f64 / sample_rate as f64)
        .collect()
}

/// Onset strength from a frame-major dB spectrogram
///
/// # Returns
/// Envelope with the same frame count as `db`
pub fn onset_strength(db: &Spectrogram, n_fft: usize, hop: usize) -> Vec<f32> {
    let n_frames = db.len();
    let lag_pad = 1 + n_fft / (2 * hop.max(1));

    let flux = db.windows(2).map(|pair| {
        let (prev, curr) = (&pair[0], &pair[1]);
        let bands = curr.len().max(1) as f32;
        curr.iter()
            .zip(prev.iter())
            .map(|(c, p)| (c - p).max(0.0))
            .sum::<f32>()
            / bands
    });

    std::iter::repeat(0.0)
        .take(lag_pad)
        .chain(flux)
        .chain(std::iter::repeat(0.0))
        .take(n_frames)
        .collect()
}

/// Pick peaks in a normalised envelope
///
/// A frame is an onset when it equals the maximum of
/// `x[n - pre_max .. n + post_max]`, is at least `delta` above the mean of
/// `x[n - pre_avg .. n + post_avg]`, and more than `wait` frames follow the
/// previous onset.
pub fn pick_peaks(x: &[f32], params: PeakPickParams) -> Vec<usize> {
    let len = x.len();
    let mut peaks = Vec::new();
    let mut n = 0;

    while n < len {
        let lo = n.saturating_sub(params.pre_max);
        let hi = (n + params.post_max).min(len);
        let local_max = x[lo..hi].iter().copied().fold(f32::NEG_INFINITY, f32::max);

        if x[n] == local_max {
            let lo = n.saturating_sub(params.pre_avg);
            let hi = (n + params.post_avg).min(len);
            let local_mean = x[lo..hi].iter().sum::<f32>() / (hi - lo) as f32;
            if x[n] >= local_mean + params.delta {
                peaks.push(n);
                n += params.wait + 1;
                continue;
            }
        }
        n += 1;
    }

    peaks
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::signals::click_track;

    #[test]
    fn test_peak_params_at_default_rate() {
        let params = PeakPickParams::for_rate(22050, 512);
        assert_eq!(params.pre_max, 1);
        assert_eq!(params.post_max, 1);
        assert_eq!(params.pre_avg, 4);
        assert_eq!(params.post_avg, 5);
        assert_eq!(params.wait, 1);
    }

    #[test]
    fn test_onset_strength_flat_spectrum_is_zero() {
        let db = vec![vec![-20.0f32; 8]; 10];
        let env = onset_strength(&db, 2048, 512);
        assert_eq!(env.len(), 10);
        assert!(env.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_onset_strength_is_shifted() {
        let mut db = vec![vec![0.0f32; 4]; 10];
        for frame in db.iter_mut().skip(5) {
            frame.iter_mut().for_each(|v| *v = 10.0);
        }
        let env = onset_strength(&db, 2048, 512);
        // Step between frames 4 and 5 lands at 4 + 3
        assert_eq!(env[7], 10.0);
        assert_eq!(env.iter().filter(|&&v| v > 0.0).count(), 1);
    }

    #[test]
    fn test_peak_picking() {
        let mut x = vec![0.05f32; 40];
        x[10] = 1.0;
        x[30] = 0.9;
        let peaks = pick_peaks(&x, PeakPickParams::for_rate(22050, 512));
        assert_eq!(peaks, vec![10, 30]);
    }

    #[test]
    fn test_detects_clicks() {
        let sr = 22050;
        let detector = OnsetDetector::new(sr, 2048, 512);
        let signal = click_track(120.0, sr, sr as usize * 4, 0.8);
        let onsets = detector.detect(&detector.strength(&signal));
        let times = detector.frames_to_time(&onsets);
        println!("Detected onsets at {:?}", times);
        assert!((7..=9).contains(&onsets.len()), "found {} onsets", onsets.len());
    }

    #[test]
    fn test_silence_has_no_onsets() {
        let detector = OnsetDetector::new(22050, 2048, 512);
        assert!(detector.detect(&detector.strength(&vec![0.0; 22050])).is_empty());
    }
}
