//! Offline beat classification experiment.
//!
//! Walks a `train/{good,bad}` + `test/{good,bad}` folder tree, extracts the
//! full feature vector for each clip and compares the registry classifiers
//! on it. See [`BeatExperiment`] for the pipeline.

pub mod dataset;
pub mod metrics;
pub mod models;
pub mod runner;
pub mod scaler;

pub use dataset::{
    expected_layout, find_audio_files, DatasetCounts, DatasetLayout, Label, LabeledDataset,
    LabeledFiles,
};
pub use models::{build_model, Classifier, MODEL_NAMES};
pub use runner::{
    timestamp_now, BeatExperiment, ExperimentResults, ExperimentRun, ModelOutcome, ModelResult,
    ModelResults, RankedFeatures, SavedResults, RESULTS_PREFIX,
};
pub use scaler::StandardScaler;
