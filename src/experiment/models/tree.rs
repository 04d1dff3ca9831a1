// Tree - binned feature matrix and a depth-limited tree grower
//
// Both boosting variants and the random forest grow trees from the same
// pieces. Features are mapped to ordinal bins once per fit; every node then
// builds a per-bin histogram of its split statistics and scans it left to
// right. Exact splitting is the special case where every distinct value has
// its own bin.
//
// What a split optimises is decided by the `SplitStats` implementation:
// gradient/hessian sums for boosting, weighted class counts for the forest.

use std::ops::{AddAssign, Sub};

use rand::rngs::StdRng;
use rand::seq::index::sample;

/// Per-node statistics that can be summed over samples
pub(crate) trait SplitStats: Copy + Default + AddAssign + Sub<Output = Self> {
    /// Node quality; a split's gain is `score(left) + score(right) - score(parent)`
    fn score(&self) -> f64;

    /// Value stored in a leaf
    fn leaf_value(&self) -> f64;

    /// Whether a child with these statistics is allowed
    fn admissible(&self) -> bool;

    /// True when no split can improve the node
    fn is_pure(&self) -> bool {
        false
    }
}

/// Gradient and hessian sums of the logistic loss
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct GradientStats {
    pub grad: f64,
    pub hess: f64,
}

/// L2 penalty on leaf weights
pub(crate) const LAMBDA: f64 = 1.0;

/// Smallest hessian sum a child may have
pub(crate) const MIN_CHILD_WEIGHT: f64 = 1.0;

impl AddAssign for GradientStats {
    fn add_assign(&mut self, other: Self) {
        self.grad += other.grad;
        self.hess += other.hess;
    }
}

impl Sub for GradientStats {
    type Output = Self;

    fn sub(self, other: Self) -> Self {
        Self {
            grad: self.grad - other.grad,
            hess: self.hess - other.hess,
        }
    }
}

impl SplitStats for GradientStats {
    fn score(&self) -> f64 {
        0.5 * self.grad * self.grad / (self.hess + LAMBDA)
    }

    fn leaf_value(&self) -> f64 {
        -self.grad / (self.hess + LAMBDA)
    }

    fn admissible(&self) -> bool {
        self.hess >= MIN_CHILD_WEIGHT
    }
}

/// Weighted class counts for Gini splits
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct ClassCounts {
    pub negative: f64,
    pub positive: f64,
}

impl ClassCounts {
    fn total(&self) -> f64 {
        self.negative + self.positive
    }
}

impl AddAssign for ClassCounts {
    fn add_assign(&mut self, other: Self) {
        self.negative += other.negative;
        self.positive += other.positive;
    }
}

impl Sub for ClassCounts {
    type Output = Self;

    fn sub(self, other: Self) -> Self {
        Self {
            negative: self.negative - other.negative,
            positive: self.positive - other.positive,
        }
    }
}

impl SplitStats for ClassCounts {
    // -N * gini(node): the gain is the weighted impurity decrease
    fn score(&self) -> f64 {
        let total = self.total();
        if total <= 0.0 {
            return 0.0;
        }
        (self.negative * self.negative + self.positive * self.positive) / total - total
    }

    fn leaf_value(&self) -> f64 {
        let total = self.total();
        if total <= 0.0 {
            0.5
        } else {
            self.positive / total
        }
    }

    fn admissible(&self) -> bool {
        self.total() > 0.0
    }

    fn is_pure(&self) -> bool {
        self.negative <= 0.0 || self.positive <= 0.0
    }
}

/// Feature matrix mapped to ordinal bins, column-major
pub(crate) struct BinnedMatrix {
    /// `bins[feature][row]`
    bins: Vec<Vec<u32>>,
    /// `thresholds[feature][b]` separates bin `b` from bin `b + 1`
    thresholds: Vec<Vec<f64>>,
}

impl BinnedMatrix {
    /// Bin every column of `rows`
    ///
    /// # Arguments
    /// * `rows` - Row-major training matrix
    /// * `max_bins` - Histogram resolution; `None` gives every distinct value a bin
    pub fn fit(rows: &[Vec<f64>], max_bins: Option<usize>) -> Self {
        let n_features = rows.first().map_or(0, Vec::len);
        let mut bins = Vec::with_capacity(n_features);
        let mut thresholds = Vec::with_capacity(n_features);

        for feature in 0..n_features {
            let column: Vec<f64> = rows.iter().map(|row| row[feature]).collect();
            let cuts = bin_thresholds(&column, max_bins);
            bins.push(
                column
                    .iter()
                    .map(|&v| cuts.partition_point(|&t| t < v) as u32)
                    .collect(),
            );
            thresholds.push(cuts);
        }

        Self { bins, thresholds }
    }

    pub fn n_features(&self) -> usize {
        self.bins.len()
    }

    fn n_bins(&self, feature: usize) -> usize {
        self.thresholds[feature].len() + 1
    }
}

/// Split points for one column
fn bin_thresholds(column: &[f64], max_bins: Option<usize>) -> Vec<f64> {
    let mut sorted = column.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mut distinct = sorted.clone();
    distinct.dedup();

    match max_bins {
        Some(limit) if distinct.len() > limit => {
            let n = sorted.len();
            let mut cuts: Vec<f64> = (1..limit).map(|k| sorted[k * n / limit]).collect();
            cuts.dedup();
            // The largest value must land in the last bin, not on a cut
            if cuts.last().copied() == distinct.last().copied() {
                cuts.pop();
            }
            cuts
        }
        _ => distinct.windows(2).map(|w| 0.5 * (w[0] + w[1])).collect(),
    }
}

#[derive(Debug, Clone)]
enum Node {
    Leaf {
        value: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

/// A fitted tree; predictions are leaf values
#[derive(Debug, Clone)]
pub(crate) struct Tree {
    nodes: Vec<Node>,
}

impl Tree {
    /// Leaf value reached by `row`
    pub fn predict_row(&self, row: &[f64]) -> f64 {
        let mut index = 0;
        loop {
            match &self.nodes[index] {
                Node::Leaf { value } => return *value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    index = if row[*feature] <= *threshold { *left } else { *right };
                }
            }
        }
    }

    /// Multiply every leaf by `factor` (boosting shrinkage)
    pub fn scaled(mut self, factor: f64) -> Self {
        for node in &mut self.nodes {
            if let Node::Leaf { value } = node {
                *value *= factor;
            }
        }
        self
    }

    #[cfg(test)]
    pub fn depth(&self) -> usize {
        fn walk(nodes: &[Node], index: usize) -> usize {
            match &nodes[index] {
                Node::Leaf { .. } => 0,
                Node::Split { left, right, .. } => 1 + walk(nodes, *left).max(walk(nodes, *right)),
            }
        }
        walk(&self.nodes, 0)
    }
}

struct BestSplit {
    feature: usize,
    bin: usize,
    gain: f64,
}

/// Depth-first grower over a binned matrix
pub(crate) struct TreeGrower<'a, S: SplitStats> {
    data: &'a BinnedMatrix,
    stats: &'a [S],
    max_depth: usize,
    /// Features tried per node; `None` tries all of them
    max_features: Option<usize>,
    rng: Option<&'a mut StdRng>,
    nodes: Vec<Node>,
    /// Summed split gain per feature
    importances: Vec<f64>,
}

impl<'a, S: SplitStats> TreeGrower<'a, S> {
    /// # Arguments
    /// * `data` - Binned training matrix
    /// * `stats` - Per-sample statistics (zero for samples left out of this tree)
    /// * `max_depth` - Depth limit
    pub fn new(data: &'a BinnedMatrix, stats: &'a [S], max_depth: usize) -> Self {
        Self {
            data,
            stats,
            max_depth,
            max_features: None,
            rng: None,
            nodes: Vec::new(),
            importances: vec![0.0; data.n_features()],
        }
    }

    /// Try a random subset of `max_features` features at each node
    pub fn with_feature_sampling(mut self, max_features: usize, rng: &'a mut StdRng) -> Self {
        self.max_features = Some(max_features.clamp(1, self.data.n_features().max(1)));
        self.rng = Some(rng);
        self
    }

    /// Grow a tree over `rows`
    ///
    /// # Returns
    /// The tree and its per-feature gain totals
    pub fn grow(mut self, rows: Vec<usize>) -> (Tree, Vec<f64>) {
        self.grow_node(rows, 0);
        (Tree { nodes: self.nodes }, self.importances)
    }

    fn grow_node(&mut self, rows: Vec<usize>, depth: usize) -> usize {
        let mut total = S::default();
        for &row in &rows {
            total += self.stats[row];
        }

        let index = self.nodes.len();
        self.nodes.push(Node::Leaf {
            value: total.leaf_value(),
        });

        if depth >= self.max_depth || rows.len() < 2 || total.is_pure() {
            return index;
        }

        let Some(best) = self.best_split(&rows, total) else {
            return index;
        };

        let threshold = self.data.thresholds[best.feature][best.bin];
        let column = &self.data.bins[best.feature];
        let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = rows
            .into_iter()
            .partition(|&row| column[row] as usize <= best.bin);

        self.importances[best.feature] += best.gain;
        let left = self.grow_node(left_rows, depth + 1);
        let right = self.grow_node(right_rows, depth + 1);
        self.nodes[index] = Node::Split {
            feature: best.feature,
            threshold,
            left,
            right,
        };
        index
    }

    fn candidate_features(&mut self) -> Vec<usize> {
        let n_features = self.data.n_features();
        match (self.max_features, self.rng.as_deref_mut()) {
            (Some(k), Some(rng)) if k < n_features => sample(rng, n_features, k).into_vec(),
            _ => (0..n_features).collect(),
        }
    }

    fn best_split(&mut self, rows: &[usize], total: S) -> Option<BestSplit> {
        let parent_score = total.score();
        let mut best: Option<BestSplit> = None;

        for feature in self.candidate_features() {
            let n_bins = self.data.n_bins(feature);
            if n_bins < 2 {
                continue;
            }
            let column = &self.data.bins[feature];
            let mut histogram = vec![S::default(); n_bins];
            for &row in rows {
                histogram[column[row] as usize] += self.stats[row];
            }

            let mut left = S::default();
            for (bin, bucket) in histogram.iter().enumerate().take(n_bins - 1) {
                left += *bucket;
                let right = total - left;
                if !left.admissible() || !right.admissible() {
                    continue;
                }
                let gain = left.score() + right.score() - parent_score;
                if gain > 1e-12 && best.as_ref().map_or(true, |b| gain > b.gain) {
                    best = Some(BestSplit { feature, bin, gain });
                }
            }
        }

        best
    }
}

/// Scale non-negative importances to sum to one (all zero stays zero)
pub(crate) fn normalize_importances(importances: &mut [f64]) {
    let total: f64 = importances.iter().sum();
    if total > 0.0 {
        for value in importances.iter_mut() {
            *value /= total;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn class_stats(labels: &[usize]) -> Vec<ClassCounts> {
        labels
            .iter()
            .map(|&y| ClassCounts {
                negative: (y == 0) as u8 as f64,
                positive: (y == 1) as u8 as f64,
            })
            .collect()
    }

    #[test]
    fn test_exact_bins_split_between_distinct_values() {
        let rows = vec![vec![1.0], vec![2.0], vec![2.0], vec![4.0]];
        let binned = BinnedMatrix::fit(&rows, None);
        assert_eq!(binned.thresholds[0], vec![1.5, 3.0]);
        assert_eq!(binned.bins[0], vec![0, 1, 1, 2]);
    }

    #[test]
    fn test_histogram_bins_are_capped() {
        let rows: Vec<Vec<f64>> = (0..1000).map(|i| vec![i as f64]).collect();
        let binned = BinnedMatrix::fit(&rows, Some(255));
        assert!(binned.n_bins(0) <= 255);
        assert_eq!(binned.bins[0][0], 0);
        assert_eq!(binned.bins[0][999] as usize, binned.n_bins(0) - 1);
    }

    #[test]
    fn test_gini_tree_separates_classes() {
        let rows: Vec<Vec<f64>> = (0..20).map(|i| vec![i as f64, (i % 3) as f64]).collect();
        let labels: Vec<usize> = (0..20).map(|i| (i >= 10) as usize).collect();
        let stats = class_stats(&labels);
        let binned = BinnedMatrix::fit(&rows, None);

        let (tree, importances) = TreeGrower::new(&binned, &stats, 5).grow((0..20).collect());

        assert_eq!(tree.depth(), 1);
        assert_eq!(tree.predict_row(&[3.0, 0.0]), 0.0);
        assert_eq!(tree.predict_row(&[15.0, 0.0]), 1.0);
        assert!(importances[0] > 0.0);
        assert_eq!(importances[1], 0.0);
    }

    #[test]
    fn test_depth_limit_is_respected() {
        let rows: Vec<Vec<f64>> = (0..64).map(|i| vec![i as f64]).collect();
        let labels: Vec<usize> = (0..64).map(|i| i % 2).collect();
        let stats = class_stats(&labels);
        let binned = BinnedMatrix::fit(&rows, None);

        let (tree, _) = TreeGrower::new(&binned, &stats, 3).grow((0..64).collect());
        assert!(tree.depth() <= 3);
    }

    #[test]
    fn test_gradient_leaf_value() {
        let stats = GradientStats { grad: 2.0, hess: 1.0 };
        assert!((stats.leaf_value() + 1.0).abs() < 1e-12);
        assert!(stats.admissible());
        assert!(!GradientStats { grad: 1.0, hess: 0.5 }.admissible());
    }

    #[test]
    fn test_normalize_importances() {
        let mut values = vec![1.0, 3.0, 0.0];
        normalize_importances(&mut values);
        assert_eq!(values, vec![0.25, 0.75, 0.0]);

        let mut zeros = vec![0.0, 0.0];
        normalize_importances(&mut zeros);
        assert_eq!(zeros, vec![0.0, 0.0]);
    }
}
