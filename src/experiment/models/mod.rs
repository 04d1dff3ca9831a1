//! Classifier registry.
//!
//! Every model implements [`Classifier`] for binary labels (`0` = bad,
//! `1` = good) over dense `f64` rows. The experiment runner picks models by
//! name through [`build_model`], so adding a model means one registry entry.

mod boosting;
mod forest;
mod logistic;
mod svm;
mod tree;

pub use boosting::{GradientBoosting, HistGradientBoosting};
pub use forest::RandomForest;
pub use logistic::LogisticRegression;
pub use svm::Svm;

use crate::error::ModelError;

/// Registry names, in the default training order
pub const MODEL_NAMES: [&str; 5] = [
    "GradientBoosting",
    "HistGradientBoosting",
    "RandomForest",
    "LogisticRegression",
    "SVM",
];

/// A binary classifier with an sklearn-like surface
pub trait Classifier: Send {
    /// Registry name
    fn name(&self) -> &'static str;

    /// Fit on rows `x` with labels `y` (0 or 1)
    fn fit(&mut self, x: &[Vec<f64>], y: &[usize]) -> Result<(), ModelError>;

    /// Probability of the positive class for every row
    fn predict_proba(&self, x: &[Vec<f64>]) -> Result<Vec<f64>, ModelError>;

    /// Hard labels; the positive class wins when its probability exceeds 0.5
    fn predict(&self, x: &[Vec<f64>]) -> Result<Vec<usize>, ModelError> {
        Ok(self
            .predict_proba(x)?
            .into_iter()
            .map(|p| (p > 0.5) as usize)
            .collect())
    }

    /// Normalised per-feature importances, for models that have them
    fn feature_importances(&self) -> Option<Vec<f64>> {
        None
    }

    /// Unfitted copy with the same hyper-parameters
    fn fresh(&self) -> Box<dyn Classifier>;
}

/// Build a registry model
///
/// # Arguments
/// * `name` - One of [`MODEL_NAMES`]
/// * `seed` - Seed for models with randomness
///
/// # Errors
/// `UnknownModel` for names outside the registry
pub fn build_model(name: &str, seed: u64) -> Result<Box<dyn Classifier>, ModelError> {
    match name {
        "GradientBoosting" => Ok(Box::new(GradientBoosting::default())),
        "HistGradientBoosting" => Ok(Box::new(HistGradientBoosting::default())),
        "RandomForest" => Ok(Box::new(RandomForest::with_seed(seed))),
        "LogisticRegression" => Ok(Box::new(LogisticRegression::default())),
        "SVM" => Ok(Box::new(Svm::default())),
        other => Err(ModelError::UnknownModel {
            name: other.to_string(),
        }),
    }
}

/// Check a training set; returns the feature count
pub(crate) fn check_training_set(x: &[Vec<f64>], y: &[usize]) -> Result<usize, ModelError> {
    let first = x.first().ok_or(ModelError::EmptyTrainingSet)?;
    let width = first.len();
    check_width(x, width)?;
    if y.len() != x.len() {
        return Err(ModelError::DimensionMismatch {
            expected: x.len(),
            got: y.len(),
        });
    }
    let class = y[0];
    if y.iter().all(|&label| label == class) {
        return Err(ModelError::SingleClass { class });
    }
    Ok(width)
}

/// Every row must have `width` features
pub(crate) fn check_width(x: &[Vec<f64>], width: usize) -> Result<(), ModelError> {
    match x.iter().find(|row| row.len() != width) {
        Some(row) => Err(ModelError::DimensionMismatch {
            expected: width,
            got: row.len(),
        }),
        None => Ok(()),
    }
}

/// Logistic function, stable for large |x|
pub(crate) fn sigmoid(x: f64) -> f64 {
    if x >= 0.0 {
        1.0 / (1.0 + (-x).exp())
    } else {
        let e = x.exp();
        e / (1.0 + e)
    }
}

#[cfg(test)]
pub(crate) mod test_data {
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    /// Two Gaussian-ish blobs, separable along the first two features
    pub fn blobs(n_per_class: usize, n_features: usize, seed: u64) -> (Vec<Vec<f64>>, Vec<usize>) {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut x = Vec::new();
        let mut y = Vec::new();
        for i in 0..2 * n_per_class {
            let label = i % 2;
            let centre = if label == 1 { 1.5 } else { -1.5 };
            let row: Vec<f64> = (0..n_features)
                .map(|f| {
                    let noise: f64 = rng.gen_range(-1.0..1.0);
                    if f < 2 {
                        centre + noise
                    } else {
                        noise
                    }
                })
                .collect();
            x.push(row);
            y.push(label);
        }
        (x, y)
    }

    pub fn accuracy(predicted: &[usize], truth: &[usize]) -> f64 {
        let hits = predicted.iter().zip(truth).filter(|(a, b)| a == b).count();
        hits as f64 / truth.len() as f64
    }
}
