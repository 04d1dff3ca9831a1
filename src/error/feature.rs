// Feature extraction error types and constants

use crate::error::ErrorCode;
use log::warn;
use std::fmt;

/// Feature extraction error code constants
///
/// Error code range: 2001-2003
pub struct FeatureErrorCodes {}

impl FeatureErrorCodes {
    /// Waveform too short for the requested computation
    pub const INSUFFICIENT_SAMPLES: i32 = 2001;

    /// Computation produced a non-finite value
    pub const NUMERICAL: i32 = 2002;

    /// A feature family failed as a whole
    pub const FAMILY_FAILED: i32 = 2003;
}

/// Log a feature error with structured context
///
/// Feature failures are recoverable (the family falls back to its zero
/// defaults), so they are logged at warn level.
pub fn log_feature_error(err: &FeatureError, context: &str) {
    warn!(
        "Feature error in {}: code={}, component=FeatureExtractor, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Feature extraction errors
///
/// Error code range: 2001-2003
#[derive(Debug, Clone, PartialEq)]
pub enum FeatureError {
    /// Not enough samples or frames for the computation
    InsufficientSamples { required: usize, got: usize },

    /// NaN or infinite value produced
    Numerical { feature: String, reason: String },

    /// A whole family failed
    FamilyFailed { family: String, reason: String },
}

impl FeatureError {
    /// Report `cause` as a failure of the whole `family`
    pub(crate) fn family_failed(family: &str, cause: &FeatureError) -> Self {
        FeatureError::FamilyFailed {
            family: family.to_string(),
            reason: cause.message(),
        }
    }
}

impl ErrorCode for FeatureError {
    fn code(&self) -> i32 {
        match self {
            FeatureError::InsufficientSamples { .. } => FeatureErrorCodes::INSUFFICIENT_SAMPLES,
            FeatureError::Numerical { .. } => FeatureErrorCodes::NUMERICAL,
            FeatureError::FamilyFailed { .. } => FeatureErrorCodes::FAMILY_FAILED,
        }
    }

    fn message(&self) -> String {
        match self {
            FeatureError::InsufficientSamples { required, got } => {
                format!("Insufficient samples: need {}, got {}", required, got)
            }
            FeatureError::Numerical { feature, reason } => {
                format!("Non-finite value in {}: {}", feature, reason)
            }
            FeatureError::FamilyFailed { family, reason } => {
                format!("Feature family {} failed: {}", family, reason)
            }
        }
    }
}

impl fmt::Display for FeatureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "FeatureError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for FeatureError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feature_error_codes() {
        assert_eq!(
            FeatureError::InsufficientSamples {
                required: 10,
                got: 5
            }
            .code(),
            2001
        );
        assert_eq!(
            FeatureError::Numerical {
                feature: "tempo".to_string(),
                reason: "NaN".to_string()
            }
            .code(),
            2002
        );
        assert_eq!(
            FeatureError::FamilyFailed {
                family: "rhythm".to_string(),
                reason: "test".to_string()
            }
            .code(),
            2003
        );
    }

    #[test]
    fn test_family_failed_wraps_cause() {
        let cause = FeatureError::InsufficientSamples {
            required: 1,
            got: 0,
        };
        let err = FeatureError::family_failed("spectral", &cause);
        assert_eq!(err.code(), FeatureErrorCodes::FAMILY_FAILED);
        assert_eq!(
            err.message(),
            "Feature family spectral failed: Insufficient samples: need 1, got 0"
        );
    }

    #[test]
    fn test_feature_error_display() {
        let err = FeatureError::InsufficientSamples {
            required: 10,
            got: 5,
        };
        assert!(err.message().contains("need 10"));
        assert!(err.message().contains("got 5"));
    }
}
