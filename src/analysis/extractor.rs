// FeatureExtractor - decode a file once and compute the full feature vector
//
// The extractor owns the extraction config and a decoding capability. A
// report pairs the features with the file path and the load parameters and
// can be written as JSON (metadata + features + count) or as a one-row CSV.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;

use crate::audio::{AudioDecoder, FileDecoder, LoadOptions, Waveform};
use crate::config::ExtractionConfig;
use crate::error::AudioError;

use super::capability::AnalysisCapability;
use super::families::{extract_all, FeatureFamily};
use super::features::FeatureVector;

/// Prefix of the files written by `ExtractionReport::save`
pub const OUTPUT_PREFIX: &str = "extracted_features_";

/// Load parameters recorded alongside the features
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtractionParams {
    /// Rate of the decoded waveform
    pub sample_rate: u32,
    /// Requested load duration (`null` = whole file)
    pub duration: Option<f64>,
    /// Requested start offset
    pub offset: f64,
}

/// Features of one file plus metadata
#[derive(Debug, Clone)]
pub struct ExtractionReport {
    pub file_path: String,
    pub extraction_params: ExtractionParams,
    pub features: FeatureVector,
}

impl ExtractionReport {
    /// Number of features (metadata excluded)
    pub fn total_features_extracted(&self) -> usize {
        self.features.len()
    }

    /// Header row and value row, comma separated
    pub fn to_csv_string(&self) -> String {
        let header: Vec<&str> = self.features.names().collect();
        let values: Vec<String> = self.features.iter().map(|(_, v)| v.to_string()).collect();
        format!("{}\n{}\n", header.join(","), values.join(","))
    }

    /// Write the pretty-printed JSON report
    pub fn save_json(&self, path: &Path) -> std::io::Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(&mut writer, self)?;
        writer.flush()
    }

    /// Write the one-row CSV table
    pub fn save_csv(&self, path: &Path) -> std::io::Result<()> {
        std::fs::write(path, self.to_csv_string())
    }

    /// Write `extracted_features_<stem>.{json,csv}` into `output_dir`
    ///
    /// # Returns
    /// Paths of the JSON and CSV files
    pub fn save(&self, output_dir: &Path) -> std::io::Result<(PathBuf, PathBuf)> {
        let stem = Path::new(&self.file_path)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("audio");
        let json_path = output_dir.join(format!("{}{}.json", OUTPUT_PREFIX, stem));
        let csv_path = output_dir.join(format!("{}{}.csv", OUTPUT_PREFIX, stem));
        self.save_json(&json_path)?;
        self.save_csv(&csv_path)?;
        Ok((json_path, csv_path))
    }
}

impl Serialize for ExtractionReport {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.features.len() + 3))?;
        map.serialize_entry("file_path", &self.file_path)?;
        map.serialize_entry("extraction_params", &self.extraction_params)?;
        for (name, value) in self.features.iter() {
            map.serialize_entry(name, &value)?;
        }
        map.serialize_entry("total_features_extracted", &self.total_features_extracted())?;
        map.end()
    }
}

/// FeatureExtractor coordinates decoding and the nine feature families
pub struct FeatureExtractor {
    config: ExtractionConfig,
    decoder: Arc<dyn AudioDecoder>,
}

impl FeatureExtractor {
    /// Create an extractor
    ///
    /// # Arguments
    /// * `config` - Load window and DSP parameters
    /// * `decoder` - Decoding capability
    pub fn new(config: ExtractionConfig, decoder: Arc<dyn AudioDecoder>) -> Self {
        Self { config, decoder }
    }

    /// Extractor with the filesystem decoder
    pub fn with_config(config: ExtractionConfig) -> Self {
        Self::new(config, Arc::new(FileDecoder))
    }

    /// Extractor sharing the decoder of a start-up capability
    ///
    /// # Errors
    /// `DecoderUnavailable` when the capability runs in fallback mode
    pub fn from_capability(
        config: ExtractionConfig,
        capability: &AnalysisCapability,
    ) -> Result<Self, AudioError> {
        Ok(Self::new(config, capability.require_decoder()?))
    }

    pub fn config(&self) -> &ExtractionConfig {
        &self.config
    }

    /// Feature vector of an already decoded waveform
    pub fn extract_waveform(&self, waveform: &Waveform) -> FeatureVector {
        extract_all(waveform, &self.config)
    }

    /// Decode `path` and extract every feature
    ///
    /// # Errors
    /// Only decoding errors; feature failures fall back to defaults
    pub fn extract_file(&self, path: &Path) -> Result<ExtractionReport, AudioError> {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        log::info!("[Extractor] Extracting features from: {}", file_name);

        let waveform = self
            .decoder
            .decode(path, &LoadOptions::from_extraction(&self.config))?;
        log::info!(
            "[Extractor] Audio loaded: {} samples at {} Hz",
            waveform.len(),
            waveform.sample_rate()
        );

        let features = self.extract_waveform(&waveform);
        log::info!(
            "[Extractor] Extraction complete: {} features extracted",
            features.len()
        );

        Ok(ExtractionReport {
            file_path: path.to_string_lossy().into_owned(),
            extraction_params: ExtractionParams {
                sample_rate: waveform.sample_rate(),
                duration: self.config.duration,
                offset: self.config.offset,
            },
            features,
        })
    }

    /// Feature count per family, in extraction order
    pub fn category_counts(&self) -> Vec<(FeatureFamily, usize)> {
        FeatureFamily::ALL
            .iter()
            .map(|&family| (family, family.defaults(&self.config).len()))
            .collect()
    }
}
