// HPSS module - Harmonic/percussive source separation
//
// Median filtering of the magnitude spectrogram: along time it keeps steady
// (harmonic) partials, along frequency it keeps broadband (percussive)
// transients. Soft Wiener-style masks (power 2) split the complex STFT,
// and each part is resynthesised with the inverse STFT.
//
// Reference: Fitzgerald, D. (2010). Harmonic/percussive separation using
// median filtering.

use rustfft::num_complex::Complex;

use super::stft::{Spectrogram, Stft};

/// Median filter length in frames (harmonic) and bins (percussive)
pub const KERNEL_SIZE: usize = 31;

/// Mask exponent
const MASK_POWER: i32 = 2;

/// Separated time-domain components
#[derive(Debug, Clone)]
pub struct HpssOutput {
    pub harmonic: Vec<f32>,
    pub percussive: Vec<f32>,
}

/// Mirror an out-of-range index back into `0..len` (edge sample repeated)
fn reflect(idx: isize, len: usize) -> usize {
    let len = len as isize;
    let period = 2 * len;
    let mut i = idx.rem_euclid(period);
    if i >= len {
        i = period - 1 - i;
    }
    i as usize
}

fn median(window: &mut [f32]) -> f32 {
    let mid = window.len() / 2;
    let (_, m, _) = window.select_nth_unstable_by(mid, |a, b| a.total_cmp(b));
    *m
}

/// Median across time for every bin
fn median_over_time(mag: &Spectrogram, kernel: usize) -> Spectrogram {
    let n_frames = mag.len();
    let n_bins = mag.first().map(Vec::len).unwrap_or(0);
    let half = (kernel / 2) as isize;
    let mut window = vec![0.0f32; kernel];

    let mut out = vec![vec![0.0f32; n_bins]; n_frames];
    for k in 0..n_bins {
        for t in 0..n_frames {
            for (j, slot) in window.iter_mut().enumerate() {
                *slot = mag[reflect(t as isize + j as isize - half, n_frames)][k];
            }
            out[t][k] = median(&mut window);
        }
    }
    out
}

/// Median across frequency for every frame
fn median_over_frequency(mag: &Spectrogram, kernel: usize) -> Spectrogram {
    let half = (kernel / 2) as isize;
    let mut window = vec![0.0f32; kernel];
    mag.iter()
        .map(|frame| {
            let n_bins = frame.len();
            (0..n_bins)
                .map(|k| {
                    for (j, slot) in window.iter_mut().enumerate() {
                        *slot = frame[reflect(k as isize + j as isize - half, n_bins)];
                    }
                    median(&mut window)
                })
                .collect()
        })
        .collect()
}

/// Soft mask `x^p / (x^p + r^p)`; 0 where both are zero
fn soft_mask(x: f32, reference: f32) -> f32 {
    let z = x.max(reference);
    if z < f32::MIN_POSITIVE {
        return 0.0;
    }
    let m = (x / z).powi(MASK_POWER);
    let r = (reference / z).powi(MASK_POWER);
    m / (m + r)
}

/// Separate `samples` into harmonic and percussive components
///
/// # Arguments
/// * `samples` - Mono audio
/// * `stft` - STFT processor (typically 2048 / 512)
///
/// # Returns
/// Both components, each the same length as `samples`
pub fn hpss(samples: &[f32], stft: &Stft) -> HpssOutput {
    let spectrum = stft.complex(samples);
    if spectrum.is_empty() {
        return HpssOutput {
            harmonic: vec![0.0; samples.len()],
            percussive: vec![0.0; samples.len()],
        };
    }

    let magnitude: Spectrogram = spectrum
        .iter()
        .map(|frame| frame.iter().map(|c| c.norm()).collect())
        .collect();
    let harmonic_env = median_over_time(&magnitude, KERNEL_SIZE);
    let percussive_env = median_over_frequency(&magnitude, KERNEL_SIZE);

    let mut harmonic_spec: Vec<Vec<Complex<f32>>> = Vec::with_capacity(spectrum.len());
    let mut percussive_spec: Vec<Vec<Complex<f32>>> = Vec::with_capacity(spectrum.len());
    for (t, frame) in spectrum.iter().enumerate() {
        let (h, p): (Vec<_>, Vec<_>) = frame
            .iter()
            .enumerate()
            .map(|(k, &x)| {
                let (he, pe) = (harmonic_env[t][k], percussive_env[t][k]);
                (x * soft_mask(he, pe), x * soft_mask(pe, he))
            })
            .unzip();
        harmonic_spec.push(h);
        percussive_spec.push(p);
    }

    HpssOutput {
        harmonic: stft.inverse(&harmonic_spec, samples.len()),
        percussive: stft.inverse(&percussive_spec, samples.len()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::signals::{click_track, sine_wave};

    fn energy(x: &[f32]) -> f32 {
        x.iter().map(|v| v * v).sum()
    }

    #[test]
    fn test_reflect_repeats_edge() {
        assert_eq!(reflect(-1, 5), 0);
        assert_eq!(reflect(-2, 5), 1);
        assert_eq!(reflect(5, 5), 4);
        assert_eq!(reflect(2, 5), 2);
    }

    #[test]
    fn test_sine_is_mostly_harmonic() {
        let stft = Stft::new(1024, 256);
        let out = hpss(&sine_wave(440.0, 22050, 22050, 0.5), &stft);
        let (h, p) = (energy(&out.harmonic), energy(&out.percussive));
        println!("sine: harmonic {} percussive {}", h, p);
        assert!(h > 5.0 * p);
    }

    #[test]
    fn test_clicks_are_mostly_percussive() {
        let stft = Stft::new(1024, 256);
        let out = hpss(&click_track(120.0, 22050, 22050 * 2, 0.8), &stft);
        let (h, p) = (energy(&out.harmonic), energy(&out.percussive));
        println!("clicks: harmonic {} percussive {}", h, p);
        assert!(p > h);
    }

    #[test]
    fn test_silence_separates_to_silence() {
        let stft = Stft::new(1024, 256);
        let out = hpss(&vec![0.0; 5000], &stft);
        assert_eq!(out.harmonic.len(), 5000);
        assert!(out.percussive.iter().all(|&v| v == 0.0));
    }
}
