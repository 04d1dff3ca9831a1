// BeatExperiment - train and compare classifiers on labeled beats
//
// Pipeline: discover files -> extract features (train, then test aligned to
// the training columns) -> standardise with training statistics -> for each
// configured model: fit, score on test, stratified CV on train -> write the
// combined results file plus one file per trained model.
//
// Per-file and per-model failures are logged and recorded; only a missing
// folder structure, empty splits or an empty model list abort the run.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;

use super::dataset::{DatasetLayout, LabeledDataset};
use super::metrics::{accuracy, cross_val_accuracy, roc_auc, weighted_scores};
use super::models::{build_model, Classifier};
use super::scaler::StandardScaler;
use crate::analysis::stats::{mean, std_dev};
use crate::analysis::FeatureExtractor;
use crate::config::{AppConfig, ExperimentConfig};
use crate::error::{log_model_error, ErrorCode, ExperimentError, ModelError};

/// Prefix of the combined results file
pub const RESULTS_PREFIX: &str = "ml_experiment_results_";

/// Timestamp used in result file names
pub fn timestamp_now() -> String {
    chrono::Local::now().format("%Y%m%d_%H%M%S").to_string()
}

/// Feature importances, highest first; serialised as an ordered map
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RankedFeatures(pub Vec<(String, f64)>);

impl RankedFeatures {
    /// Pair names with scores and sort by score, descending (stable on ties)
    pub fn rank(names: &[String], importances: &[f64]) -> Self {
        let mut ranked: Vec<(String, f64)> = names
            .iter()
            .cloned()
            .zip(importances.iter().copied())
            .collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
        Self(ranked)
    }

    pub fn top(&self, n: usize) -> &[(String, f64)] {
        &self.0[..n.min(self.0.len())]
    }
}

impl Serialize for RankedFeatures {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (name, score) in &self.0 {
            map.serialize_entry(name, score)?;
        }
        map.end()
    }
}

/// Scores of one trained model
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelResult {
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
    /// `None` when the test split holds a single class
    pub roc_auc: Option<f64>,
    pub cv_mean: f64,
    pub cv_std: f64,
    pub predictions: Vec<usize>,
    pub probabilities: Vec<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feature_importance: Option<RankedFeatures>,
}

/// Result or failure of one model
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ModelOutcome {
    Trained(ModelResult),
    Failed { error: String },
}

impl ModelOutcome {
    pub fn trained(&self) -> Option<&ModelResult> {
        match self {
            ModelOutcome::Trained(result) => Some(result),
            ModelOutcome::Failed { .. } => None,
        }
    }
}

/// Outcomes in training order; serialised as an ordered map
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelResults(pub Vec<(String, ModelOutcome)>);

impl ModelResults {
    pub fn get(&self, name: &str) -> Option<&ModelOutcome> {
        self.0.iter().find(|(n, _)| n == name).map(|(_, o)| o)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ModelOutcome)> {
        self.0.iter().map(|(n, o)| (n.as_str(), o))
    }

    /// Trained model with the highest F1 (first one wins ties; F1 must beat 0)
    pub fn best_by_f1(&self) -> Option<(&str, &ModelResult)> {
        let mut best: Option<(&str, &ModelResult)> = None;
        for (name, outcome) in self.iter() {
            if let Some(result) = outcome.trained() {
                let best_f1 = best.map_or(0.0, |(_, b)| b.f1_score);
                if result.f1_score > best_f1 {
                    best = Some((name, result));
                }
            }
        }
        best
    }
}

impl Serialize for ModelResults {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (name, outcome) in &self.0 {
            map.serialize_entry(name, outcome)?;
        }
        map.end()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExperimentInfo {
    pub beats_folder: String,
    pub train_samples: usize,
    pub test_samples: usize,
    pub total_features: usize,
    pub classes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatasetInfo {
    pub feature_names: Vec<String>,
    pub train_shape: (usize, usize),
    pub test_shape: (usize, usize),
}

/// Everything written to `ml_experiment_results_<timestamp>.json`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExperimentResults {
    pub experiment_info: ExperimentInfo,
    pub model_results: ModelResults,
    pub dataset_info: DatasetInfo,
}

impl ExperimentResults {
    /// Printable summary: dataset, per-model scores, best model and its top features
    pub fn summary(&self, top_features: usize) -> String {
        let info = &self.experiment_info;
        let mut lines = vec![
            "=".repeat(60),
            "EXPERIMENT SUMMARY".to_string(),
            "=".repeat(60),
            format!("Dataset: {}", info.beats_folder),
            format!("Training samples: {}", info.train_samples),
            format!("Test samples: {}", info.test_samples),
            format!("Features: {}", info.total_features),
            format!("Classes: {:?}", info.classes),
            String::new(),
            "MODEL PERFORMANCE:".to_string(),
            "-".repeat(40),
        ];

        for (name, outcome) in self.model_results.iter() {
            match outcome {
                ModelOutcome::Trained(result) => lines.push(format!(
                    "{:<20} | Acc: {:.4} | F1: {:.4} | CV: {:.4}",
                    name, result.accuracy, result.f1_score, result.cv_mean
                )),
                ModelOutcome::Failed { error } => {
                    lines.push(format!("{:<20} | failed: {}", name, error))
                }
            }
        }

        if let Some((name, best)) = self.model_results.best_by_f1() {
            lines.push(String::new());
            lines.push(format!("Best Model: {} (F1: {:.4})", name, best.f1_score));
            if let Some(importance) = &best.feature_importance {
                lines.push(String::new());
                lines.push(format!("Top {} Features for {}:", top_features, name));
                for (rank, (feature, score)) in importance.top(top_features).iter().enumerate() {
                    lines.push(format!("   {:2}. {:<30} | {:.4}", rank + 1, feature, score));
                }
            }
        }

        lines.join("\n")
    }
}

/// Files written by `BeatExperiment::save_results`
#[derive(Debug, Clone, PartialEq)]
pub struct SavedResults {
    pub main: PathBuf,
    pub per_model: Vec<PathBuf>,
}

/// Results of a completed run and where they were written
#[derive(Debug, Clone)]
pub struct ExperimentRun {
    pub results: ExperimentResults,
    pub saved: SavedResults,
}

/// Labeled beat classification experiment
pub struct BeatExperiment {
    layout: DatasetLayout,
    extractor: FeatureExtractor,
    config: ExperimentConfig,
}

impl BeatExperiment {
    pub fn new(layout: DatasetLayout, extractor: FeatureExtractor, config: ExperimentConfig) -> Self {
        Self {
            layout,
            extractor,
            config,
        }
    }

    /// Open `root` and build the extractor from the app config
    ///
    /// # Errors
    /// `MissingFolder` if the dataset layout is incomplete
    pub fn from_config(root: impl Into<PathBuf>, config: &AppConfig) -> Result<Self, ExperimentError> {
        Ok(Self::new(
            DatasetLayout::open(root)?,
            FeatureExtractor::with_config(config.extraction.clone()),
            config.experiment.clone(),
        ))
    }

    pub fn layout(&self) -> &DatasetLayout {
        &self.layout
    }

    /// Extract the training and test tables
    ///
    /// # Errors
    /// `NoData` when either split ends up without rows
    pub fn prepare_data(&self) -> Result<(LabeledDataset, LabeledDataset), ExperimentError> {
        log::info!("[Experiment] Preparing datasets...");
        let train_files = self.layout.split_files(&self.layout.train_dir());
        let test_files = self.layout.split_files(&self.layout.test_dir());

        log::info!("[Experiment] Extracting training features...");
        let train = LabeledDataset::extract(&train_files, &self.extractor, None);
        log::info!("[Experiment] Extracting test features...");
        let test = LabeledDataset::extract(&test_files, &self.extractor, Some(&train.feature_names));

        if train.is_empty() || test.is_empty() {
            return Err(ExperimentError::NoData);
        }
        log::info!(
            "[Experiment] Training set: {} samples, test set: {} samples, classes: {:?}",
            train.len(),
            test.len(),
            train.classes()
        );
        Ok((train, test))
    }

    /// Fit and score every configured model
    ///
    /// # Errors
    /// `NoModels` when no configured name is in the registry
    pub fn train_and_evaluate(
        &self,
        train: &LabeledDataset,
        test: &LabeledDataset,
    ) -> Result<ModelResults, ExperimentError> {
        let mut models: Vec<Box<dyn Classifier>> = Vec::new();
        for name in &self.config.models {
            match build_model(name, self.config.random_seed) {
                Ok(model) => models.push(model),
                Err(err) => log_model_error(&err, name),
            }
        }
        if models.is_empty() {
            return Err(ExperimentError::NoModels);
        }

        let (scaler, x_train) = StandardScaler::fit_transform(&train.rows);
        let x_test = scaler.transform(&test.rows);
        let y_train = train.encoded_labels();
        let y_test = test.encoded_labels();

        let mut results = ModelResults::default();
        for mut model in models {
            let name = model.name().to_string();
            log::info!("[Experiment] Training {}...", name);
            let outcome = match evaluate_model(
                model.as_mut(),
                &train.feature_names,
                (&x_train, &y_train),
                (&x_test, &y_test),
                self.config.cv_folds,
            ) {
                Ok(result) => {
                    log::info!(
                        "[Experiment] {}: Accuracy={:.4}, F1={:.4}",
                        name,
                        result.accuracy,
                        result.f1_score
                    );
                    ModelOutcome::Trained(result)
                }
                Err(err) => {
                    log_model_error(&err, &name);
                    ModelOutcome::Failed {
                        error: err.message(),
                    }
                }
            };
            results.0.push((name, outcome));
        }
        Ok(results)
    }

    /// Run the whole pipeline and write the result files
    pub fn run(&self) -> Result<ExperimentRun, ExperimentError> {
        log::info!(
            "[Experiment] Starting beat classification experiment in {}",
            self.layout.root().display()
        );
        let (train, test) = self.prepare_data()?;
        let model_results = self.train_and_evaluate(&train, &test)?;

        let results = ExperimentResults {
            experiment_info: ExperimentInfo {
                beats_folder: self.layout.root().display().to_string(),
                train_samples: train.len(),
                test_samples: test.len(),
                total_features: train.n_features(),
                classes: train.classes(),
            },
            model_results,
            dataset_info: DatasetInfo {
                feature_names: train.feature_names.clone(),
                train_shape: train.shape(),
                test_shape: test.shape(),
            },
        };

        let saved = self.save_results(&results, &timestamp_now())?;
        Ok(ExperimentRun { results, saved })
    }

    /// Write the combined file and one file per trained model into the root
    pub fn save_results(
        &self,
        results: &ExperimentResults,
        timestamp: &str,
    ) -> Result<SavedResults, ExperimentError> {
        let root = self.layout.root();
        let main = root.join(format!("{}{}.json", RESULTS_PREFIX, timestamp));
        write_json(&main, results)?;

        let mut per_model = Vec::new();
        for (name, outcome) in results.model_results.iter() {
            if let Some(result) = outcome.trained() {
                let path = root.join(format!("{}_results_{}.json", name.to_lowercase(), timestamp));
                write_json(&path, result)?;
                per_model.push(path);
            }
        }

        log::info!(
            "[Experiment] Results saved to {} (main: {})",
            root.display(),
            main.display()
        );
        Ok(SavedResults { main, per_model })
    }

    pub fn config(&self) -> &ExperimentConfig {
        &self.config
    }
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), ExperimentError> {
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, value)?;
    writer.flush()?;
    Ok(())
}

/// Fit on train, score on test, cross-validate on train
fn evaluate_model(
    model: &mut dyn Classifier,
    feature_names: &[String],
    (x_train, y_train): (&[Vec<f64>], &[usize]),
    (x_test, y_test): (&[Vec<f64>], &[usize]),
    cv_folds: usize,
) -> Result<ModelResult, ModelError> {
    model.fit(x_train, y_train)?;
    let predictions = model.predict(x_test)?;
    let probabilities = model.predict_proba(x_test)?;

    let scores = weighted_scores(y_test, &predictions);
    let cv_scores = cross_val_accuracy(model, x_train, y_train, cv_folds)?;

    Ok(ModelResult {
        accuracy: accuracy(y_test, &predictions),
        precision: scores.precision,
        recall: scores.recall,
        f1_score: scores.f1,
        roc_auc: roc_auc(y_test, &probabilities),
        cv_mean: mean(&cv_scores),
        cv_std: std_dev(&cv_scores),
        feature_importance: model
            .feature_importances()
            .map(|importances| RankedFeatures::rank(feature_names, &importances)),
        predictions,
        probabilities,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trained(f1: f64, importance: Option<RankedFeatures>) -> ModelOutcome {
        ModelOutcome::Trained(ModelResult {
            accuracy: f1,
            precision: f1,
            recall: f1,
            f1_score: f1,
            roc_auc: None,
            cv_mean: 0.5,
            cv_std: 0.1,
            predictions: vec![1, 0],
            probabilities: vec![0.9, 0.2],
            feature_importance: importance,
        })
    }

    fn sample_results() -> ExperimentResults {
        ExperimentResults {
            experiment_info: ExperimentInfo {
                beats_folder: "beats".to_string(),
                train_samples: 4,
                test_samples: 2,
                total_features: 3,
                classes: vec!["bad".to_string(), "good".to_string()],
            },
            model_results: ModelResults(vec![
                ("LogisticRegression".to_string(), trained(0.7, None)),
                (
                    "RandomForest".to_string(),
                    trained(
                        0.9,
                        Some(RankedFeatures::rank(
                            &["a".to_string(), "b".to_string(), "c".to_string()],
                            &[0.2, 0.5, 0.3],
                        )),
                    ),
                ),
                (
                    "SVM".to_string(),
                    ModelOutcome::Failed {
                        error: "boom".to_string(),
                    },
                ),
            ]),
            dataset_info: DatasetInfo {
                feature_names: vec!["a".to_string(), "b".to_string(), "c".to_string()],
                train_shape: (4, 3),
                test_shape: (2, 3),
            },
        }
    }

    #[test]
    fn test_ranked_features_sorted_descending() {
        let ranked = RankedFeatures::rank(
            &["x".to_string(), "y".to_string(), "z".to_string()],
            &[0.1, 0.6, 0.3],
        );
        let names: Vec<&str> = ranked.0.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["y", "z", "x"]);
        assert_eq!(ranked.top(2).len(), 2);
        assert_eq!(ranked.top(10).len(), 3);

        let json = serde_json::to_string(&ranked).unwrap();
        assert_eq!(json, r#"{"y":0.6,"z":0.3,"x":0.1}"#);
    }

    #[test]
    fn test_best_model_by_f1() {
        let results = sample_results();
        let (name, best) = results.model_results.best_by_f1().unwrap();
        assert_eq!(name, "RandomForest");
        assert_eq!(best.f1_score, 0.9);

        let zero = ModelResults(vec![("A".to_string(), trained(0.0, None))]);
        assert!(zero.best_by_f1().is_none());
    }

    #[test]
    fn test_results_json_shape() {
        let value = serde_json::to_value(sample_results()).unwrap();
        assert_eq!(value["experiment_info"]["train_samples"], 4);
        assert_eq!(value["dataset_info"]["train_shape"], serde_json::json!([4, 3]));
        assert_eq!(value["model_results"]["SVM"], serde_json::json!({"error": "boom"}));
        assert!(value["model_results"]["LogisticRegression"]["roc_auc"].is_null());
        assert!(value["model_results"]["LogisticRegression"]
            .get("feature_importance")
            .is_none());
        assert_eq!(
            value["model_results"]["RandomForest"]["feature_importance"]["b"],
            0.5
        );
    }

    #[test]
    fn test_summary_lists_models_and_top_features() {
        let summary = sample_results().summary(2);
        println!("{}", summary);
        assert!(summary.contains("Best Model: RandomForest (F1: 0.9000)"));
        assert!(summary.contains("SVM                  | failed: boom"));
        assert!(summary.contains("Top 2 Features for RandomForest:"));
        assert!(summary.contains("    1. b"));
        assert!(!summary.contains(" 3. a"));
    }

    #[test]
    fn test_evaluate_model_records_cv_and_importance() {
        use crate::experiment::models::test_data::blobs;

        let (x_train, y_train) = blobs(10, 3, 41);
        let (x_test, y_test) = blobs(5, 3, 42);
        let names: Vec<String> = (0..3).map(|i| format!("f{}", i)).collect();
        let mut model = build_model("RandomForest", 42).unwrap();

        let result = evaluate_model(
            model.as_mut(),
            &names,
            (&x_train, &y_train),
            (&x_test, &y_test),
            5,
        )
        .unwrap();

        assert_eq!(result.predictions.len(), 10);
        assert_eq!(result.probabilities.len(), 10);
        assert!(result.roc_auc.is_some());
        assert!(result.cv_mean > 0.8);
        assert_eq!(result.feature_importance.unwrap().0.len(), 3);
    }

    #[test]
    fn test_evaluate_model_reports_split_error() {
        let x = vec![vec![0.0], vec![1.0], vec![0.2], vec![0.9]];
        let y = vec![0, 1, 0, 1];
        let mut model = build_model("LogisticRegression", 42).unwrap();
        let err = evaluate_model(model.as_mut(), &["f".to_string()], (&x, &y), (&x, &y), 5)
            .unwrap_err();
        assert_eq!(
            err,
            ModelError::InvalidSplit {
                n_splits: 5,
                n_samples: 4
            }
        );
    }
}
