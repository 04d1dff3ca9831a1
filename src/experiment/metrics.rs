// Metrics - classification scores and stratified cross-validation
//
// Binary labels only (0 = bad, 1 = good). Precision, recall and F1 are
// support-weighted averages over the classes that occur in either the truth
// or the predictions; a class that is never predicted scores 0 precision.

use crate::error::ModelError;

use super::models::Classifier;

/// Fraction of matching labels
pub fn accuracy(truth: &[usize], predicted: &[usize]) -> f64 {
    if truth.is_empty() {
        return 0.0;
    }
    let hits = truth.iter().zip(predicted).filter(|(a, b)| a == b).count();
    hits as f64 / truth.len() as f64
}

/// Support-weighted precision, recall and F1
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeightedScores {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
}

pub fn weighted_scores(truth: &[usize], predicted: &[usize]) -> WeightedScores {
    let mut scores = WeightedScores {
        precision: 0.0,
        recall: 0.0,
        f1: 0.0,
    };
    if truth.is_empty() {
        return scores;
    }

    let n_classes = truth.iter().chain(predicted).copied().max().unwrap_or(0) + 1;
    for class in 0..n_classes {
        let support = truth.iter().filter(|&&t| t == class).count();
        let predicted_count = predicted.iter().filter(|&&p| p == class).count();
        let true_positive = truth
            .iter()
            .zip(predicted)
            .filter(|(&t, &p)| t == class && p == class)
            .count();

        let precision = if predicted_count > 0 {
            true_positive as f64 / predicted_count as f64
        } else {
            0.0
        };
        let recall = if support > 0 {
            true_positive as f64 / support as f64
        } else {
            0.0
        };
        let f1 = if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        };

        let weight = support as f64 / truth.len() as f64;
        scores.precision += weight * precision;
        scores.recall += weight * recall;
        scores.f1 += weight * f1;
    }
    scores
}

/// Area under the ROC curve via the rank-sum statistic
///
/// # Returns
/// `None` when `truth` contains only one class
pub fn roc_auc(truth: &[usize], scores: &[f64]) -> Option<f64> {
    let positives = truth.iter().filter(|&&t| t == 1).count();
    let negatives = truth.len() - positives;
    if positives == 0 || negatives == 0 {
        return None;
    }

    // Average ranks (1-based) with ties sharing their mean rank
    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[a].total_cmp(&scores[b]));
    let mut ranks = vec![0.0; scores.len()];
    let mut start = 0;
    while start < order.len() {
        let mut end = start;
        while end + 1 < order.len() && scores[order[end + 1]] == scores[order[start]] {
            end += 1;
        }
        let rank = (start + end) as f64 / 2.0 + 1.0;
        for &index in &order[start..=end] {
            ranks[index] = rank;
        }
        start = end + 1;
    }

    let positive_rank_sum: f64 = truth
        .iter()
        .zip(&ranks)
        .filter(|(&t, _)| t == 1)
        .map(|(_, r)| r)
        .sum();
    let p = positives as f64;
    Some((positive_rank_sum - p * (p + 1.0) / 2.0) / (p * negatives as f64))
}

/// Stratified k-fold split without shuffling
///
/// Samples of each class are dealt to folds in order, so every fold keeps
/// roughly the overall class balance.
///
/// # Returns
/// `(train_indices, test_indices)` per fold
pub fn stratified_k_fold(
    labels: &[usize],
    n_splits: usize,
) -> Result<Vec<(Vec<usize>, Vec<usize>)>, ModelError> {
    let n_samples = labels.len();
    if n_splits < 2 || n_splits > n_samples {
        return Err(ModelError::InvalidSplit {
            n_splits,
            n_samples,
        });
    }

    // Fold sizes per class: deal the class-sorted labels round robin
    let n_classes = labels.iter().copied().max().unwrap_or(0) + 1;
    let mut sorted = labels.to_vec();
    sorted.sort_unstable();
    let mut allocation = vec![vec![0usize; n_classes]; n_splits];
    for (position, &class) in sorted.iter().enumerate() {
        allocation[position % n_splits][class] += 1;
    }

    let mut test_fold = vec![0usize; n_samples];
    for class in 0..n_classes {
        let members: Vec<usize> = (0..n_samples).filter(|&i| labels[i] == class).collect();
        let mut cursor = members.iter();
        for (fold, counts) in allocation.iter().enumerate() {
            for &index in cursor.by_ref().take(counts[class]) {
                test_fold[index] = fold;
            }
        }
    }

    Ok((0..n_splits)
        .map(|fold| {
            let (test, train): (Vec<usize>, Vec<usize>) =
                (0..n_samples).partition(|&i| test_fold[i] == fold);
            (train, test)
        })
        .collect())
}

/// Accuracy of fresh model copies on each stratified fold
pub fn cross_val_accuracy(
    model: &dyn Classifier,
    x: &[Vec<f64>],
    y: &[usize],
    n_splits: usize,
) -> Result<Vec<f64>, ModelError> {
    let mut scores = Vec::with_capacity(n_splits);
    for (train, test) in stratified_k_fold(y, n_splits)? {
        let pick = |indices: &[usize]| -> (Vec<Vec<f64>>, Vec<usize>) {
            (
                indices.iter().map(|&i| x[i].clone()).collect(),
                indices.iter().map(|&i| y[i]).collect(),
            )
        };
        let (x_train, y_train) = pick(&train);
        let (x_test, y_test) = pick(&test);

        let mut fold_model = model.fresh();
        fold_model.fit(&x_train, &y_train)?;
        scores.push(accuracy(&y_test, &fold_model.predict(&x_test)?));
    }
    Ok(scores)
}
