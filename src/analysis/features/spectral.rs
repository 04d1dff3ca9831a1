// Spectral module - Frequency-domain frame features
//
// This module computes spectral descriptors from magnitude spectra, one
// frame at a time. Frequencies are bin centres `k * sr / n_fft`.
//
// References:
// - Peeters, G. (2004). A large set of audio features for sound description
// - Jiang, D.-N. et al. (2002). Music type classification by spectral contrast

use super::stft::bin_frequencies;

/// Spectral rolloff threshold (85% of spectral energy)
const ROLLOFF_THRESHOLD: f32 = 0.85;

/// Floor applied to power values before taking logs
pub const AMIN: f32 = 1e-10;

/// Lowest edge of the first contrast octave band
const CONTRAST_FMIN: f32 = 200.0;

/// Octave bands above the base band
pub const CONTRAST_BANDS: usize = 6;

/// Fraction of a band treated as peak / valley
const CONTRAST_QUANTILE: f32 = 0.02;

/// Bin range of one contrast band
#[derive(Debug, Clone)]
struct ContrastBand {
    /// Bins that make up the band (after edge adjustments)
    bins: std::ops::Range<usize>,
    /// Bins averaged for peak and valley
    alpha: usize,
}

/// Spectral feature computation functions
pub struct SpectralFeatures {
    freqs: Vec<f32>,
    contrast_bands: Vec<Option<ContrastBand>>,
}

impl SpectralFeatures {
    /// Create a new spectral features processor
    ///
    /// # Arguments
    /// * `sample_rate` - Audio sample rate in Hz
    /// * `n_fft` - FFT window size
    pub fn new(sample_rate: u32, n_fft: usize) -> Self {
        let freqs = bin_frequencies(sample_rate, n_fft);
        let contrast_bands = contrast_bands(&freqs);
        Self {
            freqs,
            contrast_bands,
        }
    }

    /// Compute spectral centroid (weighted mean frequency)
    ///
    /// Formula: centroid = Σ(f_i × |X[i]|) / Σ|X[i]|
    ///
    /// # Returns
    /// Spectral centroid in Hz, 0.0 for a silent frame
    pub fn compute_centroid(&self, spectrum: &[f32]) -> f32 {
        let magnitude_sum: f32 = spectrum.iter().sum();
        if magnitude_sum <= f32::MIN_POSITIVE {
            return 0.0;
        }
        let weighted_sum: f32 = spectrum
            .iter()
            .zip(self.freqs.iter())
            .map(|(&mag, &freq)| freq * mag)
            .sum();
        weighted_sum / magnitude_sum
    }

    /// Compute spectral bandwidth (order 2 deviation around the centroid)
    ///
    /// Formula: bandwidth = sqrt(Σ p_i × (f_i - centroid)^2), p = |X| / Σ|X|
    pub fn compute_bandwidth(&self, spectrum: &[f32], centroid: f32) -> f32 {
        let magnitude_sum: f32 = spectrum.iter().sum();
        if magnitude_sum <= f32::MIN_POSITIVE {
            return 0.0;
        }
        spectrum
            .iter()
            .zip(self.freqs.iter())
            .map(|(&mag, &freq)| (mag / magnitude_sum) * (freq - centroid).powi(2))
            .sum::<f32>()
            .sqrt()
    }

    /// Compute spectral rolloff (85% threshold frequency)
    ///
    /// # Returns
    /// Lowest bin frequency at which the cumulative magnitude reaches 85% of
    /// the frame total (0.0 for a silent frame)
    pub fn compute_rolloff(&self, spectrum: &[f32]) -> f32 {
        let total: f32 = spectrum.iter().sum();
        let threshold = ROLLOFF_THRESHOLD * total;

        let mut cumulative = 0.0;
        for (&mag, &freq) in spectrum.iter().zip(self.freqs.iter()) {
            cumulative += mag;
            if cumulative >= threshold {
                return freq;
            }
        }
        self.freqs.last().copied().unwrap_or(0.0)
    }

    /// Compute spectral flatness (tonality measure) on the power spectrum
    ///
    /// Formula: flatness = geometric_mean(P) / arithmetic_mean(P), with
    /// P = max(|X|^2, 1e-10). A silent frame is perfectly flat (1.0).
    ///
    /// # Returns
    /// Spectral flatness (0.0 to 1.0)
    pub fn compute_flatness(&self, spectrum: &[f32]) -> f32 {
        if spectrum.is_empty() {
            return 0.0;
        }
        let n = spectrum.len() as f64;
        let (log_sum, sum) = spectrum.iter().fold((0.0f64, 0.0f64), |(l, s), &mag| {
            let power = ((mag * mag).max(AMIN)) as f64;
            (l + power.ln(), s + power)
        });
        let geometric_mean = (log_sum / n).exp();
        let arithmetic_mean = sum / n;
        (geometric_mean / arithmetic_mean) as f32
    }

    /// Compute octave-band spectral contrast
    ///
    /// For each of 7 bands (below 200 Hz, then 6 octaves) the contrast is
    /// the dB difference between the mean of the top 2% and the bottom 2% of
    /// the band's magnitudes. Bands with no bins report 0.0.
    pub fn compute_contrast(&self, spectrum: &[f32]) -> [f32; CONTRAST_BANDS + 1] {
        let mut contrast = [0.0f32; CONTRAST_BANDS + 1];
        for (slot, band) in contrast.iter_mut().zip(self.contrast_bands.iter()) {
            let Some(band) = band else { continue };
            let mut sub_band: Vec<f32> = spectrum
                .get(band.bins.clone())
                .map(|s| s.to_vec())
                .unwrap_or_default();
            if sub_band.is_empty() {
                continue;
            }
            sub_band.sort_by(|a, b| a.total_cmp(b));
            let alpha = band.alpha.min(sub_band.len());
            let valley = sub_band[..alpha].iter().sum::<f32>() / alpha as f32;
            let peak = sub_band[sub_band.len() - alpha..].iter().sum::<f32>() / alpha as f32;
            *slot = power_db(peak) - power_db(valley);
        }
        contrast
    }

    /// First-order polynomial fit of magnitude against frequency
    ///
    /// # Returns
    /// `(slope, intercept)` of the least-squares line
    pub fn compute_poly(&self, spectrum: &[f32]) -> (f32, f32) {
        let n = spectrum.len().min(self.freqs.len());
        if n < 2 {
            return (0.0, spectrum.first().copied().unwrap_or(0.0));
        }
        let x_mean = self.freqs[..n].iter().map(|&f| f as f64).sum::<f64>() / n as f64;
        let y_mean = spectrum[..n].iter().map(|&m| m as f64).sum::<f64>() / n as f64;
        let (mut sxy, mut sxx) = (0.0f64, 0.0f64);
        for (&f, &m) in self.freqs[..n].iter().zip(spectrum[..n].iter()) {
            let dx = f as f64 - x_mean;
            sxy += dx * (m as f64 - y_mean);
            sxx += dx * dx;
        }
        let slope = if sxx > 0.0 { sxy / sxx } else { 0.0 };
        ((slope) as f32, (y_mean - slope * x_mean) as f32)
    }
}

/// `10 * log10(max(x, amin))`
fn power_db(x: f32) -> f32 {
    10.0 * x.max(AMIN).log10()
}

/// Bin ranges for the contrast bands
///
/// Band edges are 0, 200, 400, ... Hz. Every band above the first borrows
/// one bin from below, the last band extends to Nyquist, and every band but
/// the last drops its top bin.
fn contrast_bands(freqs: &[f32]) -> Vec<Option<ContrastBand>> {
    let mut edges = vec![0.0f32];
    edges.extend((0..=CONTRAST_BANDS).map(|i| CONTRAST_FMIN * 2f32.powi(i as i32)));

    edges
        .windows(2)
        .enumerate()
        .map(|(k, edge)| {
            let (low, high) = (edge[0], edge[1]);
            let first = freqs.iter().position(|&f| f >= low && f <= high)?;
            let last = freqs.iter().rposition(|&f| f >= low && f <= high)?;

            let start = if k > 0 { first.saturating_sub(1) } else { first };
            let end = if k == CONTRAST_BANDS {
                freqs.len() - 1
            } else {
                last
            };
            let band_size = end - start + 1;
            let alpha = ((CONTRAST_QUANTILE * band_size as f32).round() as usize).max(1);
            let bins = if k < CONTRAST_BANDS {
                start..end
            } else {
                start..end + 1
            };
            Some(ContrastBand { bins, alpha })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single_bin_spectrum(n_bins: usize, bin: usize) -> Vec<f32> {
        let mut s = vec![0.0; n_bins];
        s[bin] = 1.0;
        s
    }

    #[test]
    fn test_centroid_of_single_bin() {
        let spectral = SpectralFeatures::new(22050, 2048);
        let spectrum = single_bin_spectrum(1025, 100);
        let expected = 100.0 * 22050.0 / 2048.0;
        assert!((spectral.compute_centroid(&spectrum) - expected).abs() < 1e-2);
        assert!(spectral.compute_bandwidth(&spectrum, expected) < 1e-2);
    }

    #[test]
    fn test_flatness_white_vs_tonal() {
        let spectral = SpectralFeatures::new(22050, 2048);
        let flat = vec![1.0; 1025];
        let tonal = single_bin_spectrum(1025, 40);
        assert!((spectral.compute_flatness(&flat) - 1.0).abs() < 1e-4);
        assert!(spectral.compute_flatness(&tonal) < 1e-3);
        assert!((spectral.compute_flatness(&vec![0.0; 1025]) - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_rolloff_silent_frame_is_zero() {
        let spectral = SpectralFeatures::new(22050, 2048);
        assert_eq!(spectral.compute_rolloff(&vec![0.0; 1025]), 0.0);
        let rolloff = spectral.compute_rolloff(&single_bin_spectrum(1025, 200));
        assert!((rolloff - 200.0 * 22050.0 / 2048.0).abs() < 1e-2);
    }

    #[test]
    fn test_contrast_has_seven_bands() {
        let spectral = SpectralFeatures::new(22050, 2048);
        let contrast = spectral.compute_contrast(&vec![1.0; 1025]);
        assert_eq!(contrast.len(), 7);
        assert!(contrast.iter().all(|c| c.abs() < 1e-4));
    }

    #[test]
    fn test_contrast_survives_low_sample_rate() {
        // Nyquist 4 kHz leaves the top octave bands empty
        let spectral = SpectralFeatures::new(8000, 2048);
        let contrast = spectral.compute_contrast(&vec![0.5; 1025]);
        assert!(contrast.iter().all(|c| c.is_finite()));
    }

    #[test]
    fn test_poly_fit_of_line() {
        let spectral = SpectralFeatures::new(2048, 2048);
        // freqs are 0, 1, 2, ... Hz; spectrum = 2f + 3
        let spectrum: Vec<f32> = (0..1025).map(|k| 2.0 * k as f32 + 3.0).collect();
        let (slope, intercept) = spectral.compute_poly(&spectrum);
        assert!((slope - 2.0).abs() < 1e-3);
        assert!((intercept - 3.0).abs() < 1e-2);
    }
}
