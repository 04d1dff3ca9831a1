// Classifier training error types and constants

use crate::error::ErrorCode;
use log::error;
use std::fmt;

/// Model error code constants
///
/// Error code range: 4001-4006
pub struct ModelErrorCodes {}

impl ModelErrorCodes {
    /// Training matrix has no rows
    pub const EMPTY_TRAINING_SET: i32 = 4001;

    /// Training labels contain a single class
    pub const SINGLE_CLASS: i32 = 4002;

    /// Row width differs from the fitted width
    pub const DIMENSION_MISMATCH: i32 = 4003;

    /// Predict called before fit
    pub const NOT_FITTED: i32 = 4004;

    /// Registry has no model with this name
    pub const UNKNOWN_MODEL: i32 = 4005;

    /// Cross-validation folds cannot be formed
    pub const INVALID_SPLIT: i32 = 4006;
}

/// Log a model error with structured context
pub fn log_model_error(err: &ModelError, model: &str) {
    error!(
        "Model error in {}: code={}, component=Classifier, message={}",
        model,
        err.code(),
        err.message()
    );
}

/// Classifier errors
///
/// A model error is recorded against that model only; the experiment keeps
/// training the remaining models.
///
/// Error code range: 4001-4006
#[derive(Debug, Clone, PartialEq)]
pub enum ModelError {
    /// No training rows
    EmptyTrainingSet,

    /// Only one class present in the labels
    SingleClass { class: usize },

    /// Feature count mismatch
    DimensionMismatch { expected: usize, got: usize },

    /// Model used before fitting
    NotFitted,

    /// Unknown registry entry
    UnknownModel { name: String },

    /// More folds requested than there are samples
    InvalidSplit { n_splits: usize, n_samples: usize },
}

impl ErrorCode for ModelError {
    fn code(&self) -> i32 {
        match self {
            ModelError::EmptyTrainingSet => ModelErrorCodes::EMPTY_TRAINING_SET,
            ModelError::SingleClass { .. } => ModelErrorCodes::SINGLE_CLASS,
            ModelError::DimensionMismatch { .. } => ModelErrorCodes::DIMENSION_MISMATCH,
            ModelError::NotFitted => ModelErrorCodes::NOT_FITTED,
            ModelError::UnknownModel { .. } => ModelErrorCodes::UNKNOWN_MODEL,
            ModelError::InvalidSplit { .. } => ModelErrorCodes::INVALID_SPLIT,
        }
    }

    fn message(&self) -> String {
        match self {
            ModelError::EmptyTrainingSet => "Training set is empty".to_string(),
            ModelError::SingleClass { class } => format!(
                "This solver needs samples of at least 2 classes in the data, but the data contains only one class: {}",
                class
            ),
            ModelError::DimensionMismatch { expected, got } => format!(
                "X has {} features, but model is expecting {} features as input",
                got, expected
            ),
            ModelError::NotFitted => "Model is not fitted yet".to_string(),
            ModelError::UnknownModel { name } => format!("Unknown model: {}", name),
            ModelError::InvalidSplit {
                n_splits,
                n_samples,
            } => format!(
                "Cannot have number of splits n_splits={} greater than the number of samples: n_samples={}",
                n_splits, n_samples
            ),
        }
    }
}

impl fmt::Display for ModelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ModelError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for ModelError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_error_codes() {
        assert_eq!(ModelError::EmptyTrainingSet.code(), 4001);
        assert_eq!(ModelError::SingleClass { class: 1 }.code(), 4002);
        assert_eq!(
            ModelError::DimensionMismatch {
                expected: 3,
                got: 2
            }
            .code(),
            4003
        );
        assert_eq!(ModelError::NotFitted.code(), 4004);
        assert_eq!(
            ModelError::UnknownModel {
                name: "x".to_string()
            }
            .code(),
            4005
        );
        assert_eq!(
            ModelError::InvalidSplit {
                n_splits: 5,
                n_samples: 3
            }
            .code(),
            4006
        );
    }

    #[test]
    fn test_dimension_mismatch_message() {
        let err = ModelError::DimensionMismatch {
            expected: 219,
            got: 218,
        };
        assert!(err.message().contains("218 features"));
        assert!(err.message().contains("expecting 219"));
    }
}
