// Audio module - file decoding into mono waveforms

pub mod decoder;
pub mod resample;
mod waveform;

// Re-export commonly used types for convenience
pub use decoder::{AudioDecoder, FileDecoder, LoadOptions, SUPPORTED_EXTENSIONS};
pub use waveform::Waveform;
