// Feature DSP building blocks
//
// Module organization:
// - types: Ordered feature vectors (FeatureValue, FeatureVector)
// - stft: Centred STFT / inverse STFT with a periodic Hann window
// - temporal: Time-domain frame features (RMS, ZCR)
// - spectral: Centroid, bandwidth, rolloff, flatness, contrast, poly fit
// - mel: Mel filterbank, dB conversion, MFCC and deltas
// - chroma: STFT chroma, CQT-style chroma, CENS
// - tonnetz: Tonal centroid projection
// - hpss: Median-filter harmonic/percussive separation
// - tempogram: Autocorrelation and Fourier tempograms
//
// The families in `analysis::families` combine these into named features.

pub mod chroma;
pub mod hpss;
pub mod mel;
pub mod spectral;
pub mod stft;
pub mod tempogram;
pub mod temporal;
pub mod tonnetz;
mod types;

pub use types::{FeatureValue, FeatureVector};
