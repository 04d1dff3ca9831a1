// AnalysisCapability - whether this process can decode audio
//
// Built once at start-up and handed to the HTTP state (and the CLI). With
// a decoder, uploads are decoded and measured. Without one, every upload
// gets the fixed fallback result.

use std::path::Path;
use std::sync::Arc;

use crate::audio::{AudioDecoder, FileDecoder, LoadOptions};
use crate::error::AudioError;

use super::analyzer::{analyze_waveform, fallback_result, AnalysisResult};

/// Decoding capability injected into request handlers
#[derive(Clone)]
pub struct AnalysisCapability {
    decoder: Option<Arc<dyn AudioDecoder>>,
}

impl AnalysisCapability {
    /// Capability backed by `decoder`
    pub fn with_decoder(decoder: Arc<dyn AudioDecoder>) -> Self {
        Self {
            decoder: Some(decoder),
        }
    }

    /// Capability backed by the filesystem decoder
    pub fn available() -> Self {
        Self::with_decoder(Arc::new(FileDecoder))
    }

    /// Degraded mode: no decoder, fallback results only
    pub fn unavailable() -> Self {
        Self { decoder: None }
    }

    /// Pick the mode at start-up
    ///
    /// # Arguments
    /// * `force_fallback` - Start degraded even though a decoder exists
    pub fn detect(force_fallback: bool) -> Self {
        if force_fallback {
            log::warn!("[Capability] Fallback forced; uploads will not be decoded");
            Self::unavailable()
        } else {
            let capability = Self::available();
            log::info!(
                "[Capability] Decoder available: {}",
                capability.decoder_name().unwrap_or("none")
            );
            capability
        }
    }

    pub fn is_available(&self) -> bool {
        self.decoder.is_some()
    }

    pub fn decoder_name(&self) -> Option<&'static str> {
        self.decoder.as_ref().map(|d| d.name())
    }

    /// Decoder for callers with no fallback, such as feature extraction
    ///
    /// # Errors
    /// `DecoderUnavailable` in degraded mode
    pub fn require_decoder(&self) -> Result<Arc<dyn AudioDecoder>, AudioError> {
        self.decoder.clone().ok_or(AudioError::DecoderUnavailable)
    }

    /// Analyse a staged upload
    ///
    /// # Arguments
    /// * `path` - Audio file on disk
    /// * `file_size_bytes` - Size used by the fallback duration estimate
    ///
    /// # Errors
    /// Decoding errors when a decoder is present
    pub fn analyze_file(
        &self,
        path: &Path,
        file_size_bytes: u64,
    ) -> Result<AnalysisResult, AudioError> {
        match &self.decoder {
            Some(decoder) => {
                log::info!("[Analyzer] Loading audio with {}...", decoder.name());
                let waveform = decoder.decode(path, &LoadOptions::native())?;
                Ok(analyze_waveform(&waveform))
            }
            None => {
                log::warn!("[Analyzer] No decoder available, returning fallback result");
                Ok(fallback_result(file_size_bytes))
            }
        }
    }
}

impl std::fmt::Debug for AnalysisCapability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnalysisCapability")
            .field("decoder", &self.decoder_name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::AnalysisMethod;
    use crate::audio::Waveform;

    struct SilentDecoder;

    impl AudioDecoder for SilentDecoder {
        fn name(&self) -> &'static str {
            "silent"
        }

        fn decode(&self, _path: &Path, _options: &LoadOptions) -> Result<Waveform, AudioError> {
            Waveform::new(vec![0.0; 22050], 22050)
        }
    }

    struct BrokenDecoder;

    impl AudioDecoder for BrokenDecoder {
        fn name(&self) -> &'static str {
            "broken"
        }

        fn decode(&self, _path: &Path, _options: &LoadOptions) -> Result<Waveform, AudioError> {
            Err(AudioError::DecodeFailed {
                reason: "corrupt frame".to_string(),
            })
        }
    }

    #[test]
    fn test_unavailable_returns_fallback() {
        let capability = AnalysisCapability::unavailable();
        assert!(!capability.is_available());
        let result = capability
            .analyze_file(Path::new("/does/not/matter.mp3"), 1024 * 1024)
            .unwrap();
        assert_eq!(result.analysis_method, AnalysisMethod::Fallback);
        assert!((result.duration - 10.0).abs() < 1e-12);
    }

    #[test]
    fn test_injected_decoder_is_used() {
        let capability = AnalysisCapability::with_decoder(Arc::new(SilentDecoder));
        assert_eq!(capability.decoder_name(), Some("silent"));
        let result = capability.analyze_file(Path::new("x.wav"), 0).unwrap();
        assert_eq!(result.analysis_method, AnalysisMethod::Dsp);
        assert_eq!(result.sample_rate, 22050);
    }

    #[test]
    fn test_decode_errors_propagate() {
        let capability = AnalysisCapability::with_decoder(Arc::new(BrokenDecoder));
        let err = capability.analyze_file(Path::new("x.wav"), 0).unwrap_err();
        assert!(matches!(err, AudioError::DecodeFailed { .. }));
    }

    #[test]
    fn test_require_decoder_in_degraded_mode() {
        let err = AnalysisCapability::unavailable().require_decoder().err();
        assert_eq!(err, Some(AudioError::DecoderUnavailable));

        let decoder = AnalysisCapability::with_decoder(Arc::new(SilentDecoder))
            .require_decoder()
            .unwrap();
        assert_eq!(decoder.name(), "silent");
    }

    #[test]
    fn test_detect_honours_force_fallback() {
        assert!(!AnalysisCapability::detect(true).is_available());
        assert!(AnalysisCapability::detect(false).is_available());
    }
}
