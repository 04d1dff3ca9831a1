// RandomForest - bagged Gini trees with per-node feature sampling
//
// Each tree sees a bootstrap sample (drawn with replacement, duplicates kept
// as weights) and tries floor(sqrt(n_features)) random features per node.
// Probabilities are the mean of the leaf class frequencies.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::tree::{normalize_importances, BinnedMatrix, ClassCounts, Tree, TreeGrower};
use super::{check_training_set, check_width, Classifier};
use crate::error::ModelError;

/// Forest hyper-parameters
#[derive(Debug, Clone, PartialEq)]
pub struct ForestParams {
    pub n_estimators: usize,
    pub max_depth: usize,
    pub seed: u64,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            max_depth: 10,
            seed: 42,
        }
    }
}

struct Forest {
    trees: Vec<Tree>,
    n_features: usize,
    importances: Vec<f64>,
}

pub struct RandomForest {
    params: ForestParams,
    fitted: Option<Forest>,
}

impl RandomForest {
    pub fn new(params: ForestParams) -> Self {
        Self {
            params,
            fitted: None,
        }
    }

    pub fn with_seed(seed: u64) -> Self {
        Self::new(ForestParams {
            seed,
            ..ForestParams::default()
        })
    }
}

impl Default for RandomForest {
    fn default() -> Self {
        Self::new(ForestParams::default())
    }
}

impl Classifier for RandomForest {
    fn name(&self) -> &'static str {
        "RandomForest"
    }

    fn fit(&mut self, x: &[Vec<f64>], y: &[usize]) -> Result<(), ModelError> {
        let n_features = check_training_set(x, y)?;
        let n_samples = x.len();
        let binned = BinnedMatrix::fit(x, None);
        let max_features = ((n_features as f64).sqrt().floor() as usize).max(1);
        let mut rng = StdRng::seed_from_u64(self.params.seed);

        let mut trees = Vec::with_capacity(self.params.n_estimators);
        let mut importances = vec![0.0; n_features];

        for _ in 0..self.params.n_estimators {
            let mut weights = vec![0.0; n_samples];
            for _ in 0..n_samples {
                weights[rng.gen_range(0..n_samples)] += 1.0;
            }
            let stats: Vec<ClassCounts> = weights
                .iter()
                .zip(y)
                .map(|(&w, &label)| ClassCounts {
                    negative: if label == 0 { w } else { 0.0 },
                    positive: if label == 1 { w } else { 0.0 },
                })
                .collect();
            let rows: Vec<usize> = (0..n_samples).filter(|&i| weights[i] > 0.0).collect();

            let (tree, mut gains) = TreeGrower::new(&binned, &stats, self.params.max_depth)
                .with_feature_sampling(max_features, &mut rng)
                .grow(rows);
            normalize_importances(&mut gains);
            for (total, gain) in importances.iter_mut().zip(gains) {
                *total += gain;
            }
            trees.push(tree);
        }

        normalize_importances(&mut importances);
        self.fitted = Some(Forest {
            trees,
            n_features,
            importances,
        });
        Ok(())
    }

    fn predict_proba(&self, x: &[Vec<f64>]) -> Result<Vec<f64>, ModelError> {
        let forest = self.fitted.as_ref().ok_or(ModelError::NotFitted)?;
        check_width(x, forest.n_features)?;
        let n_trees = forest.trees.len().max(1) as f64;
        Ok(x.iter()
            .map(|row| forest.trees.iter().map(|t| t.predict_row(row)).sum::<f64>() / n_trees)
            .collect())
    }

    fn feature_importances(&self) -> Option<Vec<f64>> {
        self.fitted.as_ref().map(|f| f.importances.clone())
    }

    fn fresh(&self) -> Box<dyn Classifier> {
        Box::new(Self::new(self.params.clone()))
    }
}
