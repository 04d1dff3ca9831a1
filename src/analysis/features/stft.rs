// STFT module - short-time Fourier transform with centred frames
//
// Frames are centred: the signal is zero-padded by n_fft/2 on both sides, so
// frame t is centred on sample t * hop and there are 1 + len / hop frames.
// A periodic Hann window reduces spectral leakage. The inverse transform is
// windowed overlap-add normalised by the summed squared window, which makes
// `inverse(forward(x))` reproduce x.
//
// Spectrograms are stored frame-major: `spec[frame][bin]`.

use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};
use std::f32::consts::PI;
use std::sync::Arc;

/// Default STFT window size
pub const N_FFT: usize = 2048;

/// Default hop between frames
pub const HOP_LENGTH: usize = 512;

/// Frame-major magnitude or power spectrogram
pub type Spectrogram = Vec<Vec<f32>>;

/// Frame-major complex spectrogram
pub type ComplexSpectrogram = Vec<Vec<Complex<f32>>>;

/// Periodic Hann window of length `n`
pub fn hann_window(n: usize) -> Vec<f32> {
    (0..n)
        .map(|i| 0.5 - 0.5 * (2.0 * PI * i as f32 / n as f32).cos())
        .collect()
}

/// Number of centred frames for `len` samples
pub fn frame_count(len: usize, hop: usize) -> usize {
    if len == 0 {
        0
    } else {
        1 + len / hop.max(1)
    }
}

/// Centre frequency of each positive-frequency bin
pub fn bin_frequencies(sample_rate: u32, n_fft: usize) -> Vec<f32> {
    (0..=n_fft / 2)
        .map(|k| k as f32 * sample_rate as f32 / n_fft as f32)
        .collect()
}

/// STFT processor with pre-planned forward and inverse FFTs
pub struct Stft {
    n_fft: usize,
    hop: usize,
    window: Vec<f32>,
    forward: Arc<dyn Fft<f32>>,
    inverse: Arc<dyn Fft<f32>>,
}

impl Stft {
    /// Create a processor
    ///
    /// # Arguments
    /// * `n_fft` - Window / FFT size in samples
    /// * `hop` - Hop between frame centres in samples
    pub fn new(n_fft: usize, hop: usize) -> Self {
        let n_fft = n_fft.max(2);
        let mut planner = FftPlanner::new();
        Self {
            n_fft,
            hop: hop.max(1),
            window: hann_window(n_fft),
            forward: planner.plan_fft_forward(n_fft),
            inverse: planner.plan_fft_inverse(n_fft),
        }
    }

    pub fn n_fft(&self) -> usize {
        self.n_fft
    }

    pub fn hop(&self) -> usize {
        self.hop
    }

    /// Positive-frequency bins per frame
    pub fn n_bins(&self) -> usize {
        self.n_fft / 2 + 1
    }

    /// Complex spectrogram of `samples`
    pub fn complex(&self, samples: &[f32]) -> ComplexSpectrogram {
        let n_frames = frame_count(samples.len(), self.hop);
        let pad = self.n_fft / 2;
        let mut frames = Vec::with_capacity(n_frames);
        let mut buffer = vec![Complex::new(0.0f32, 0.0); self.n_fft];

        for t in 0..n_frames {
            let start = (t * self.hop) as isize - pad as isize;
            for (i, slot) in buffer.iter_mut().enumerate() {
                let idx = start + i as isize;
                let sample = if idx >= 0 && (idx as usize) < samples.len() {
                    samples[idx as usize]
                } else {
                    0.0
                };
                *slot = Complex::new(sample * self.window[i], 0.0);
            }
            self.forward.process(&mut buffer);
            frames.push(buffer[..self.n_bins()].to_vec());
        }
        frames
    }

    /// Magnitude spectrogram `|X|`
    pub fn magnitude(&self, samples: &[f32]) -> Spectrogram {
        self.complex(samples)
            .into_iter()
            .map(|frame| frame.iter().map(|c| c.norm()).collect())
            .collect()
    }

    /// Power spectrogram `|X|^2`
    pub fn power(&self, samples: &[f32]) -> Spectrogram {
        self.complex(samples)
            .into_iter()
            .map(|frame| frame.iter().map(|c| c.norm_sqr()).collect())
            .collect()
    }

    /// Inverse STFT by windowed overlap-add
    ///
    /// # Arguments
    /// * `frames` - Complex spectrogram (positive-frequency bins)
    /// * `length` - Number of output samples
    pub fn inverse(&self, frames: &[Vec<Complex<f32>>], length: usize) -> Vec<f32> {
        if frames.is_empty() || length == 0 {
            return vec![0.0; length];
        }
        let n = self.n_fft;
        let total = n + self.hop * (frames.len() - 1);
        let mut output = vec![0.0f32; total];
        let mut window_sum = vec![0.0f32; total];
        let mut buffer = vec![Complex::new(0.0f32, 0.0); n];
        let scale = 1.0 / n as f32;

        for (t, frame) in frames.iter().enumerate() {
            // Rebuild the full Hermitian spectrum
            for (k, slot) in buffer.iter_mut().enumerate() {
                *slot = if k <= n / 2 {
                    frame.get(k).copied().unwrap_or_default()
                } else {
                    frame.get(n - k).map(|c| c.conj()).unwrap_or_default()
                };
            }
            self.inverse.process(&mut buffer);

            let offset = t * self.hop;
            for i in 0..n {
                let w = self.window[i];
                output[offset + i] += buffer[i].re * scale * w;
                window_sum[offset + i] += w * w;
            }
        }

        for (sample, &wss) in output.iter_mut().zip(window_sum.iter()) {
            if wss > f32::MIN_POSITIVE {
                *sample /= wss;
            }
        }

        let start = n / 2;
        (0..length)
            .map(|i| output.get(start + i).copied().unwrap_or(0.0))
            .collect()
    }
}
