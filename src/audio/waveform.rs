// Waveform - decoded mono signal plus its sample rate

use crate::error::AudioError;

/// Decoded mono audio
///
/// Produced once by the decoder and read by every feature function. There
/// is no mutable access to the samples after construction.
#[derive(Debug, Clone, PartialEq)]
pub struct Waveform {
    samples: Vec<f32>,
    sample_rate: u32,
}

impl Waveform {
    /// Wrap decoded samples
    ///
    /// # Errors
    /// `InvalidSampleRate` when `sample_rate` is zero
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Result<Self, AudioError> {
        if sample_rate == 0 {
            return Err(AudioError::InvalidSampleRate { sample_rate });
        }
        Ok(Self {
            samples,
            sample_rate,
        })
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Duration in seconds
    pub fn duration_secs(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }

    /// True when every sample is exactly zero
    pub fn is_silent(&self) -> bool {
        self.samples.iter().all(|&s| s == 0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_sample_rate_rejected() {
        let result = Waveform::new(vec![0.0; 10], 0);
        assert_eq!(
            result.unwrap_err(),
            AudioError::InvalidSampleRate { sample_rate: 0 }
        );
    }

    #[test]
    fn test_duration() {
        let waveform = Waveform::new(vec![0.0; 44100], 22050).unwrap();
        assert!((waveform.duration_secs() - 2.0).abs() < 1e-12);
        assert!(waveform.is_silent());
        assert_eq!(waveform.len(), 44100);
    }
}
