// Error types for the beat analysis crate
//
// This module defines custom error types for decoding, feature extraction,
// experiment orchestration and model training, providing structured error
// handling with stable numeric codes for logs and result files.

mod audio;
mod experiment;
mod feature;
mod model;

pub use audio::{log_audio_error, AudioError, AudioErrorCodes};
pub use experiment::{log_experiment_error, ExperimentError, ExperimentErrorCodes};
pub use feature::{log_feature_error, FeatureError, FeatureErrorCodes};
pub use model::{log_model_error, ModelError, ModelErrorCodes};

/// Error codes for structured error reporting
///
/// This trait provides a standard way to get error codes and messages
/// from custom error types, enabling consistent error handling across
/// the HTTP, CLI and experiment boundaries.
pub trait ErrorCode {
    /// Get the numeric error code
    fn code(&self) -> i32;

    /// Get the human-readable error message
    fn message(&self) -> String;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_trait_objects() {
        let audio_err: &dyn ErrorCode = &AudioError::EmptyAudio;
        assert_eq!(audio_err.code(), AudioErrorCodes::EMPTY_AUDIO);

        let model_err: &dyn ErrorCode = &ModelError::NotFitted;
        assert_eq!(model_err.code(), ModelErrorCodes::NOT_FITTED);
    }

    #[test]
    fn test_error_propagation() {
        fn may_fail() -> Result<(), FeatureError> {
            Err(FeatureError::InsufficientSamples {
                required: 2,
                got: 0,
            })
        }

        fn caller() -> Result<(), FeatureError> {
            may_fail()?;
            Ok(())
        }

        assert!(caller().is_err());
    }
}
