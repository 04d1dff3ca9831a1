// Temporal module - Time-domain frame features
//
// RMS energy and zero-crossing rate are computed on centred frames of
// `frame_length` samples every `hop` samples, matching the STFT framing, so
// temporal and spectral trajectories have the same frame count.

/// Threshold below which a sample counts as zero for ZCR
const ZCR_ZERO_THRESHOLD: f32 = 1e-10;

/// Temporal feature computation functions
pub struct TemporalFeatures {
    frame_length: usize,
    hop: usize,
}

impl TemporalFeatures {
    /// Create a new temporal features processor
    ///
    /// # Arguments
    /// * `frame_length` - Frame size in samples (typically 2048)
    /// * `hop` - Hop between frame centres in samples (typically 512)
    pub fn new(frame_length: usize, hop: usize) -> Self {
        Self {
            frame_length: frame_length.max(1),
            hop: hop.max(1),
        }
    }

    /// Iterate centred, zero-padded frames
    fn frames<'a>(&'a self, audio: &'a [f32]) -> impl Iterator<Item = Vec<f32>> + 'a {
        let n_frames = super::stft::frame_count(audio.len(), self.hop);
        let pad = (self.frame_length / 2) as isize;
        (0..n_frames).map(move |t| {
            let start = (t * self.hop) as isize - pad;
            (0..self.frame_length as isize)
                .map(|i| {
                    let idx = start + i;
                    if idx >= 0 && (idx as usize) < audio.len() {
                        audio[idx as usize]
                    } else {
                        0.0
                    }
                })
                .collect()
        })
    }

    /// Root-mean-square energy per frame
    ///
    /// # Returns
    /// One value per centred frame
    pub fn compute_rms(&self, audio: &[f32]) -> Vec<f32> {
        self.frames(audio)
            .map(|frame| {
                let energy: f32 = frame.iter().map(|x| x * x).sum();
                (energy / frame.len() as f32).sqrt()
            })
            .collect()
    }

    /// Zero-crossing rate per frame
    ///
    /// Formula: ZCR = crossings / frame_length, where a crossing is a sign
    /// change between neighbouring samples. Values below 1e-10 in magnitude
    /// count as zero, and zero counts as positive.
    ///
    /// # Returns
    /// One value per centred frame, each in 0.0..=1.0
    pub fn compute_zcr(&self, audio: &[f32]) -> Vec<f32> {
        self.frames(audio)
            .map(|frame| {
                let signs: Vec<bool> = frame
                    .iter()
                    .map(|&x| x.abs() <= ZCR_ZERO_THRESHOLD || x > 0.0)
                    .collect();
                let crossings = signs.windows(2).filter(|w| w[0] != w[1]).count();
                crossings as f32 / frame.len() as f32
            })
            .collect()
    }
}
