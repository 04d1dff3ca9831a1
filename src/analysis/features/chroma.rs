// Chroma module - Pitch-class energy profiles
//
// Three variants:
// - STFT chroma: each power bin is folded onto its nearest pitch class.
// - CQT-style chroma: 84 semitone bands from C1 read off a long (8192-point)
//   magnitude STFT, then folded onto 12 classes.
// - CENS: CQT chroma, L1-normalised, quantised, smoothed over 41 frames and
//   L2-normalised.
//
// Pitch class 0 is C. Chroma matrices are frame-major: `chroma[frame][class]`.

use super::stft::{bin_frequencies, Spectrogram, Stft};

/// Pitch classes per octave
pub const N_CHROMA: usize = 12;

/// FFT size for the CQT-style chroma
const CQT_N_FFT: usize = 8192;

/// Lowest CQT band centre (C1)
const CQT_FMIN: f64 = 32.703_195_662_574_83;

/// Seven octaves of semitone bands
const CQT_BINS: usize = 84;

/// CENS quantisation thresholds, each contributing 0.25
const CENS_STEPS: [f32; 4] = [0.4, 0.2, 0.1, 0.05];

/// CENS smoothing window length (frames)
const CENS_SMOOTH: usize = 41;

/// Pitch class of a frequency (nearest semitone, A4 = 440 Hz)
pub fn pitch_class(freq: f32) -> Option<usize> {
    if freq <= 0.0 {
        return None;
    }
    let midi = 69.0 + 12.0 * (freq / 440.0).log2();
    Some((midi.round() as i64).rem_euclid(N_CHROMA as i64) as usize)
}

/// Scale every frame so its maximum is 1
pub fn normalize_max(frames: &mut Spectrogram) {
    for frame in frames.iter_mut() {
        let peak = frame.iter().fold(0.0f32, |m, &v| m.max(v.abs()));
        if peak > f32::MIN_POSITIVE {
            frame.iter_mut().for_each(|v| *v /= peak);
        }
    }
}

/// Scale every frame so its absolute values sum to 1
pub fn normalize_l1(frames: &mut Spectrogram) {
    for frame in frames.iter_mut() {
        let total: f32 = frame.iter().map(|v| v.abs()).sum();
        if total > f32::MIN_POSITIVE {
            frame.iter_mut().for_each(|v| *v /= total);
        }
    }
}

/// Scale every frame to unit Euclidean length
pub fn normalize_l2(frames: &mut Spectrogram) {
    for frame in frames.iter_mut() {
        let norm = frame.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > f32::MIN_POSITIVE {
            frame.iter_mut().for_each(|v| *v /= norm);
        }
    }
}

/// Chroma from a power spectrogram
///
/// # Arguments
/// * `power` - Frame-major power spectrogram
/// * `sample_rate` - Audio sample rate in Hz
/// * `n_fft` - FFT size that produced `power`
pub fn chroma_stft(power: &Spectrogram, sample_rate: u32, n_fft: usize) -> Spectrogram {
    let classes: Vec<Option<usize>> = bin_frequencies(sample_rate, n_fft)
        .into_iter()
        .map(pitch_class)
        .collect();

    let mut chroma: Spectrogram = power
        .iter()
        .map(|frame| {
            let mut profile = vec![0.0f32; N_CHROMA];
            for (&p, class) in frame.iter().zip(classes.iter()) {
                if let Some(c) = class {
                    profile[*c] += p;
                }
            }
            profile
        })
        .collect();
    normalize_max(&mut chroma);
    chroma
}

/// Semitone band energies read from a long STFT
pub struct CqtChroma {
    stft: Stft,
    /// Bin ranges per semitone band; `Err(f)` means interpolate at bin `f`
    bands: Vec<Result<std::ops::Range<usize>, f64>>,
}

impl CqtChroma {
    /// # Arguments
    /// * `sample_rate` - Audio sample rate in Hz
    /// * `hop` - Hop between frames (same as the short STFT)
    pub fn new(sample_rate: u32, hop: usize) -> Self {
        let bin_width = sample_rate as f64 / CQT_N_FFT as f64;
        let nyquist_bin = CQT_N_FFT / 2;
        let half_semitone = 2f64.powf(1.0 / 24.0);

        let bands = (0..CQT_BINS)
            .map(|b| {
                let centre = CQT_FMIN * 2f64.powf(b as f64 / 12.0);
                let lo = ((centre / half_semitone) / bin_width).ceil() as usize;
                let hi = (((centre * half_semitone) / bin_width).ceil() as usize).min(nyquist_bin + 1);
                if lo < hi {
                    Ok(lo..hi)
                } else {
                    Err(centre / bin_width)
                }
            })
            .collect();

        Self {
            stft: Stft::new(CQT_N_FFT, hop),
            bands,
        }
    }

    /// Unnormalised 84-band semitone spectrogram
    pub fn semitone_spectrogram(&self, samples: &[f32]) -> Spectrogram {
        self.stft
            .magnitude(samples)
            .iter()
            .map(|frame| {
                self.bands
                    .iter()
                    .map(|band| match band {
                        Ok(range) => frame.get(range.clone()).map(|s| s.iter().sum()).unwrap_or(0.0),
                        Err(position) => interpolate(frame, *position),
                    })
                    .collect()
            })
            .collect()
    }

    /// Folded, unnormalised 12-class chroma
    pub fn raw_chroma(&self, samples: &[f32]) -> Spectrogram {
        self.semitone_spectrogram(samples)
            .into_iter()
            .map(|bands| {
                let mut profile = vec![0.0f32; N_CHROMA];
                for (b, energy) in bands.into_iter().enumerate() {
                    profile[b % N_CHROMA] += energy;
                }
                profile
            })
            .collect()
    }

    /// ∞-normalised CQT chroma
    pub fn chroma(&self, samples: &[f32]) -> Spectrogram {
        let mut chroma = self.raw_chroma(samples);
        normalize_max(&mut chroma);
        chroma
    }

    /// Chroma Energy Normalized Statistics
    pub fn cens(&self, samples: &[f32]) -> Spectrogram {
        chroma_cens(self.raw_chroma(samples))
    }
}

fn interpolate(frame: &[f32], position: f64) -> f32 {
    let lo = position.floor() as usize;
    let frac = (position - lo as f64) as f32;
    match (frame.get(lo), frame.get(lo + 1)) {
        (Some(&a), Some(&b)) => a + (b - a) * frac,
        (Some(&a), None) => a,
        _ => 0.0,
    }
}

/// CENS from unnormalised chroma
pub fn chroma_cens(mut chroma: Spectrogram) -> Spectrogram {
    normalize_l1(&mut chroma);

    let quantised: Spectrogram = chroma
        .iter()
        .map(|frame| {
            frame
                .iter()
                .map(|&v| CENS_STEPS.iter().filter(|&&step| v > step).count() as f32 * 0.25)
                .collect()
        })
        .collect();

    // Hann smoothing along time
    let window: Vec<f32> = super::stft::hann_window(CENS_SMOOTH + 2)[1..=CENS_SMOOTH].to_vec();
    let window_sum: f32 = window.iter().sum();
    let half = (CENS_SMOOTH / 2) as isize;
    let n_frames = quantised.len() as isize;

    let mut smoothed: Spectrogram = (0..n_frames)
        .map(|t| {
            (0..N_CHROMA)
                .map(|c| {
                    window
                        .iter()
                        .enumerate()
                        .filter_map(|(j, &w)| {
                            let idx = t + j as isize - half;
                            (idx >= 0 && idx < n_frames).then(|| w * quantised[idx as usize][c])
                        })
                        .sum::<f32>()
                        / window_sum
                })
                .collect()
        })
        .collect();

    normalize_l2(&mut smoothed);
    smoothed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::signals::sine_wave;

    #[test]
    fn test_pitch_class_table() {
        assert_eq!(pitch_class(440.0), Some(9));
        assert_eq!(pitch_class(261.63), Some(0));
        assert_eq!(pitch_class(0.0), None);
    }

    #[test]
    fn test_stft_chroma_of_a440() {
        let sr = 22050;
        let stft = Stft::new(2048, 512);
        let chroma = chroma_stft(&stft.power(&sine_wave(440.0, sr, sr as usize, 0.5)), sr, 2048);
        let mid = &chroma[chroma.len() / 2];
        assert_eq!(mid[9], 1.0);
        assert!(mid.iter().all(|&v| v <= 1.0));
    }

    #[test]
    fn test_cqt_chroma_of_a440() {
        let sr = 22050;
        let cqt = CqtChroma::new(sr, 512);
        let chroma = cqt.chroma(&sine_wave(440.0, sr, sr as usize * 2, 0.5));
        let mid = &chroma[chroma.len() / 2];
        let best = mid
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i);
        println!("CQT chroma profile: {:?}", mid);
        assert_eq!(best, Some(9));
    }

    #[test]
    fn test_cens_frames_are_unit_length() {
        let sr = 22050;
        let cqt = CqtChroma::new(sr, 512);
        let cens = cqt.cens(&sine_wave(330.0, sr, sr as usize, 0.5));
        for frame in &cens {
            let norm: f32 = frame.iter().map(|v| v * v).sum::<f32>().sqrt();
            assert!((norm - 1.0).abs() < 1e-4 || norm == 0.0);
        }
    }

    #[test]
    fn test_silence_chroma_is_zero() {
        let cqt = CqtChroma::new(22050, 512);
        assert!(cqt
            .chroma(&vec![0.0; 4096])
            .iter()
            .all(|f| f.iter().all(|&v| v == 0.0)));
    }
}
