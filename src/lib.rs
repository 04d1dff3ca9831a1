// Beat Analysis - tempo/key service and beat classification experiments
// Decoding, feature extraction and classifiers shared by the HTTP service and the CLI

// Module declarations
pub mod analysis;
pub mod audio;
pub mod config;
pub mod error;
pub mod experiment;
pub mod http;
pub mod logging;
pub mod testing;

// Re-exports for convenience
pub use analysis::{AnalysisCapability, AnalysisResult, FeatureExtractor, FeatureVector};
pub use audio::Waveform;
pub use config::AppConfig;
