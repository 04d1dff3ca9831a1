// Resampling - linear interpolation between sample rates

/// Resample a mono signal by linear interpolation
///
/// # Arguments
/// * `samples` - Input signal
/// * `from_sr` - Input sample rate in Hz
/// * `to_sr` - Output sample rate in Hz
///
/// # Returns
/// Signal of length `ceil(len * to_sr / from_sr)`; the input unchanged when
/// the rates match
pub fn resample_linear(samples: &[f32], from_sr: u32, to_sr: u32) -> Vec<f32> {
    if from_sr == to_sr || samples.is_empty() || from_sr == 0 || to_sr == 0 {
        return samples.to_vec();
    }

    let ratio = from_sr as f64 / to_sr as f64;
    let output_len = ((samples.len() as f64) * to_sr as f64 / from_sr as f64).ceil() as usize;
    let mut output = Vec::with_capacity(output_len);

    for i in 0..output_len {
        let src_pos = i as f64 * ratio;
        let idx = src_pos as usize;
        let frac = (src_pos - idx as f64) as f32;

        let sample = if idx + 1 < samples.len() {
            samples[idx] * (1.0 - frac) + samples[idx + 1] * frac
        } else if idx < samples.len() {
            samples[idx]
        } else {
            0.0
        };
        output.push(sample);
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_rate_is_identity() {
        let input = vec![0.1, 0.2, 0.3];
        assert_eq!(resample_linear(&input, 22050, 22050), input);
    }

    #[test]
    fn test_downsample_halves_length() {
        let input: Vec<f32> = (0..44100).map(|i| i as f32).collect();
        let output = resample_linear(&input, 44100, 22050);
        assert_eq!(output.len(), 22050);
        assert_eq!(output[10], 20.0);
    }

    #[test]
    fn test_upsample_interpolates() {
        let input = vec![0.0, 1.0];
        let output = resample_linear(&input, 1, 2);
        assert_eq!(output.len(), 4);
        assert!((output[1] - 0.5).abs() < 1e-6);
    }
}
