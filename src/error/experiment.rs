// Experiment runner error types and constants

use crate::error::ErrorCode;
use log::error;
use std::fmt;
use std::path::Path;

/// Experiment error code constants
///
/// Error code range: 3001-3005
pub struct ExperimentErrorCodes {}

impl ExperimentErrorCodes {
    /// Required dataset folder is missing
    pub const MISSING_FOLDER: i32 = 3001;

    /// No usable samples in train or test split
    pub const NO_DATA: i32 = 3002;

    /// Filesystem read/write failed
    pub const IO: i32 = 3003;

    /// Result serialization failed
    pub const SERIALIZATION: i32 = 3004;

    /// Configuration selected no known model
    pub const NO_MODELS: i32 = 3005;
}

/// Log an experiment error with structured context
pub fn log_experiment_error(err: &ExperimentError, context: &str) {
    error!(
        "Experiment error in {}: code={}, component=ExperimentRunner, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Experiment orchestration errors
///
/// Only these end a run; per-file and per-model failures are recorded and
/// skipped instead.
///
/// Error code range: 3001-3005
#[derive(Debug, Clone, PartialEq)]
pub enum ExperimentError {
    /// Dataset folder (root, train/ or test/) missing
    MissingFolder { path: String },

    /// Train or test split ended up empty
    NoData,

    /// Filesystem error
    Io { reason: String },

    /// JSON/CSV serialization error
    Serialization { reason: String },

    /// No configured model name matched the registry
    NoModels,
}

impl ExperimentError {
    pub(crate) fn missing(path: &Path) -> Self {
        ExperimentError::MissingFolder {
            path: path.display().to_string(),
        }
    }
}

impl ErrorCode for ExperimentError {
    fn code(&self) -> i32 {
        match self {
            ExperimentError::MissingFolder { .. } => ExperimentErrorCodes::MISSING_FOLDER,
            ExperimentError::NoData => ExperimentErrorCodes::NO_DATA,
            ExperimentError::Io { .. } => ExperimentErrorCodes::IO,
            ExperimentError::Serialization { .. } => ExperimentErrorCodes::SERIALIZATION,
            ExperimentError::NoModels => ExperimentErrorCodes::NO_MODELS,
        }
    }

    fn message(&self) -> String {
        match self {
            ExperimentError::MissingFolder { path } => format!("Folder not found: {}", path),
            ExperimentError::NoData => "No data found in train/test folders".to_string(),
            ExperimentError::Io { reason } => format!("I/O error: {}", reason),
            ExperimentError::Serialization { reason } => {
                format!("Serialization error: {}", reason)
            }
            ExperimentError::NoModels => "No known models configured".to_string(),
        }
    }
}

impl fmt::Display for ExperimentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ExperimentError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for ExperimentError {}

impl From<std::io::Error> for ExperimentError {
    fn from(err: std::io::Error) -> Self {
        ExperimentError::Io {
            reason: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for ExperimentError {
    fn from(err: serde_json::Error) -> Self {
        ExperimentError::Serialization {
            reason: err.to_string(),
        }
    }
}
