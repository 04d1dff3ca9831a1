// Tempogram module - Local tempo structure of the onset envelope
//
// Autocorrelation tempogram: each frame is the Hann-windowed local
// autocorrelation of the onset envelope around that frame (lags 0 to
// win_length - 1), scaled so its peak is 1.
// Fourier tempogram: magnitude STFT of the onset envelope (hop 1).

use rustfft::num_complex::Complex;
use rustfft::FftPlanner;

use super::chroma::normalize_max;
use super::stft::{hann_window, Spectrogram, Stft};

/// Default tempogram window (onset frames)
pub const TEMPOGRAM_WIN_LENGTH: usize = 384;

/// Autocorrelation tempogram
///
/// # Arguments
/// * `envelope` - Onset strength envelope
/// * `win_length` - Local window in frames
///
/// # Returns
/// Frame-major matrix: one row of `win_length` lags per envelope frame
pub fn autocorrelation_tempogram(envelope: &[f32], win_length: usize) -> Spectrogram {
    if envelope.is_empty() || win_length == 0 {
        return Vec::new();
    }

    // Linear ramp padding towards zero on both sides
    let pad = win_length / 2;
    let first = envelope[0];
    let last = envelope[envelope.len() - 1];
    let mut padded = Vec::with_capacity(envelope.len() + 2 * pad);
    padded.extend((0..pad).map(|i| first * i as f32 / pad as f32));
    padded.extend_from_slice(envelope);
    padded.extend((0..pad).map(|i| last * (pad - i) as f32 / pad as f32));

    let window = hann_window(win_length);
    let n_pad = 2 * win_length;
    let mut planner = FftPlanner::new();
    let forward = planner.plan_fft_forward(n_pad);
    let inverse = planner.plan_fft_inverse(n_pad);
    let mut buffer = vec![Complex::new(0.0f32, 0.0); n_pad];

    let mut tempogram: Spectrogram = (0..envelope.len())
        .map(|t| {
            for (i, slot) in buffer.iter_mut().enumerate() {
                let value = if i < win_length {
                    padded.get(t + i).copied().unwrap_or(0.0) * window[i]
                } else {
                    0.0
                };
                *slot = Complex::new(value, 0.0);
            }
            forward.process(&mut buffer);
            for c in buffer.iter_mut() {
                *c = Complex::new(c.norm_sqr(), 0.0);
            }
            inverse.process(&mut buffer);
            buffer[..win_length]
                .iter()
                .map(|c| c.re / n_pad as f32)
                .collect()
        })
        .collect();

    normalize_max(&mut tempogram);
    tempogram
}

/// Fourier tempogram magnitudes
pub fn fourier_tempogram(envelope: &[f32], win_length: usize) -> Spectrogram {
    Stft::new(win_length, 1).magnitude(envelope)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pulse_train(len: usize, period: usize) -> Vec<f32> {
        (0..len).map(|i| if i % period == 0 { 1.0 } else { 0.0 }).collect()
    }

    #[test]
    fn test_tempogram_shape_and_scale() {
        let env = pulse_train(500, 20);
        let tg = autocorrelation_tempogram(&env, TEMPOGRAM_WIN_LENGTH);
        assert_eq!(tg.len(), 500);
        assert!(tg.iter().all(|f| f.len() == TEMPOGRAM_WIN_LENGTH));
        let mid = &tg[250];
        assert!((mid[0] - 1.0).abs() < 1e-4);
        // Periodicity shows up at the pulse period
        assert!(mid[20] > mid[10] + 0.3, "lag 20 {} lag 10 {}", mid[20], mid[10]);
    }

    #[test]
    fn test_zero_envelope_gives_zero_tempogram() {
        let tg = autocorrelation_tempogram(&vec![0.0; 50], 16);
        assert!(tg.iter().all(|f| f.iter().all(|&v| v.abs() < 1e-12)));
        let ft = fourier_tempogram(&vec![0.0; 50], 16);
        assert_eq!(ft.len(), 51);
    }
}
