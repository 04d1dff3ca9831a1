// Analysis module - DSP pipeline for tempo, key and feature extraction
//
// Architecture:
// - features: STFT, spectral, mel, chroma, HPSS and tempogram building blocks
// - onset / beat: onset envelope, peak picking, tempo and beat tracking
// - key: tonic/mode heuristic and confidence score
// - families / extractor: the nine feature families and file-level extraction
// - analyzer / capability: the tempo/key summary served over HTTP

pub mod analyzer;
pub mod beat;
pub mod capability;
pub mod extractor;
pub mod families;
pub mod features;
pub mod key;
pub mod onset;
pub mod stats;

pub use analyzer::{analyze_waveform, fallback_result, AnalysisMethod, AnalysisResult};
pub use capability::AnalysisCapability;
pub use extractor::{ExtractionParams, ExtractionReport, FeatureExtractor};
pub use families::{extract_all, extract_or_default, FeatureFamily};
pub use features::{FeatureValue, FeatureVector};
pub use key::{KeyEstimate, PitchClass, Scale};
