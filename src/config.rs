//! Configuration management for the analysis service and experiment runner
//!
//! This module provides runtime configuration loading from JSON files,
//! enabling fast iteration without recompilation. Server limits, feature
//! extraction parameters and the classifier selection can be adjusted via
//! the config file.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Environment variable naming an alternative config file
pub const CONFIG_ENV_VAR: &str = "BEAT_ANALYSIS_CONFIG";

/// Default config location relative to the working directory
pub const DEFAULT_CONFIG_PATH: &str = "config/beat_analysis.json";

/// Upload cap: 50 MiB
pub const MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

/// Complete application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub extraction: ExtractionConfig,
    pub experiment: ExperimentConfig,
}

/// HTTP service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Interface to bind
    pub host: String,
    /// TCP port
    pub port: u16,
    /// Largest accepted upload in bytes (inclusive)
    pub max_upload_bytes: usize,
    /// Name reported by the health endpoint
    pub service_name: String,
    /// Start without a decoding capability (degraded mode)
    pub force_fallback: bool,
    /// Where uploads are staged while analysed; `None` uses the system temp dir
    pub upload_dir: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            max_upload_bytes: MAX_UPLOAD_BYTES,
            service_name: "beat-analysis-api".to_string(),
            force_fallback: false,
            upload_dir: None,
        }
    }
}

/// Feature extraction parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Target sample rate for loading (resampled if the file differs)
    pub sample_rate: u32,
    /// Seconds to load, `None` loads the full file
    pub duration: Option<f64>,
    /// Start offset in seconds
    pub offset: f64,
    /// STFT window size in samples
    pub n_fft: usize,
    /// STFT hop size in samples
    pub hop_length: usize,
    /// Number of MFCC coefficients
    pub n_mfcc: usize,
    /// Number of mel bands
    pub n_mels: usize,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            sample_rate: 22050,
            duration: Some(30.0),
            offset: 0.0,
            n_fft: 2048,
            hop_length: 512,
            n_mfcc: 20,
            n_mels: 128,
        }
    }
}

/// Experiment runner configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentConfig {
    /// Registry names of the models to train, in order
    pub models: Vec<String>,
    /// Stratified cross-validation folds on the training split
    pub cv_folds: usize,
    /// Seed for stochastic models
    pub random_seed: u64,
    /// How many top features to print for the best model
    pub top_features: usize,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            models: vec![
                "GradientBoosting".to_string(),
                "HistGradientBoosting".to_string(),
                "RandomForest".to_string(),
                "LogisticRegression".to_string(),
                "SVM".to_string(),
            ],
            cv_folds: 5,
            random_seed: 42,
            top_features: 10,
        }
    }
}

impl AppConfig {
    /// Load configuration from JSON file
    ///
    /// # Arguments
    /// * `path` - Path to JSON config file
    ///
    /// # Returns
    /// The parsed configuration, or the defaults if the file is missing or
    /// the JSON is invalid
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Self {
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(config) => {
                    log::info!("[Config] Loaded configuration from {:?}", path.as_ref());
                    config
                }
                Err(err) => {
                    log::warn!(
                        "[Config] Failed to parse JSON from {:?}: {}. Using defaults.",
                        path.as_ref(),
                        err
                    );
                    Self::default()
                }
            },
            Err(err) => {
                log::debug!(
                    "[Config] No config file at {:?}: {}. Using defaults.",
                    path.as_ref(),
                    err
                );
                Self::default()
            }
        }
    }

    /// Load configuration from `$BEAT_ANALYSIS_CONFIG` or the default path
    pub fn load() -> Self {
        match std::env::var(CONFIG_ENV_VAR) {
            Ok(path) => Self::load_from_file(path),
            Err(_) => Self::load_from_file(DEFAULT_CONFIG_PATH),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.max_upload_bytes, 52_428_800);
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.extraction.sample_rate, 22050);
        assert_eq!(config.extraction.duration, Some(30.0));
        assert_eq!(config.extraction.n_mfcc, 20);
        assert_eq!(config.experiment.cv_folds, 5);
        assert_eq!(config.experiment.models.len(), 5);
    }

    #[test]
    fn test_json_roundtrip() {
        let config = AppConfig::default();
        let json = serde_json::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed.extraction, config.extraction);
        assert_eq!(parsed.experiment.models, config.experiment.models);
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let parsed: AppConfig =
            serde_json::from_str(r#"{ "server": { "port": 9001 } }"#).unwrap();
        assert_eq!(parsed.server.port, 9001);
        assert_eq!(parsed.server.max_upload_bytes, MAX_UPLOAD_BYTES);
        assert_eq!(parsed.extraction.hop_length, 512);
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = AppConfig::load_from_file("does/not/exist.json");
        assert_eq!(config.server.service_name, "beat-analysis-api");
    }

    #[test]
    fn test_invalid_json_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        fs::write(&path, "{ not json").unwrap();
        let config = AppConfig::load_from_file(&path);
        assert_eq!(config.experiment.random_seed, 42);
    }
}
