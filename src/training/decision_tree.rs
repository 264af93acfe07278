//! CART decision tree

use super::{check_class_labels, check_shapes, Estimator};
use crate::error::{PipelineError, Result};
use ndarray::{Array1, Array2, ArrayView1};
use rand::seq::index::sample;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Decision tree node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TreeNode {
    Leaf {
        value: f64,
        n_samples: usize,
    },
    Split {
        feature_idx: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
    },
}

impl TreeNode {
    fn predict(&self, row: ArrayView1<f64>) -> f64 {
        let mut node = self;
        loop {
            match node {
                TreeNode::Leaf { value, .. } => return *value,
                TreeNode::Split {
                    feature_idx,
                    threshold,
                    left,
                    right,
                } => {
                    node = if row[*feature_idx] <= *threshold { left } else { right };
                }
            }
        }
    }

    pub fn depth(&self) -> usize {
        match self {
            TreeNode::Leaf { .. } => 0,
            TreeNode::Split { left, right, .. } => 1 + left.depth().max(right.depth()),
        }
    }
}

/// Impurity criterion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Criterion {
    /// Gini impurity (classification)
    Gini,
    /// Entropy (classification)
    Entropy,
    /// Variance (regression)
    SquaredError,
}

impl Criterion {
    pub fn is_classification(self) -> bool {
        !matches!(self, Criterion::SquaredError)
    }
}

/// Running statistics of the targets on one side of a split
#[derive(Debug, Clone, Default)]
struct SideStats {
    count: usize,
    sum: f64,
    sq_sum: f64,
    classes: BTreeMap<i64, usize>,
}

impl SideStats {
    fn add(&mut self, y: f64) {
        self.count += 1;
        self.sum += y;
        self.sq_sum += y * y;
        *self.classes.entry(y.round() as i64).or_default() += 1;
    }

    fn remove(&mut self, y: f64) {
        self.count -= 1;
        self.sum -= y;
        self.sq_sum -= y * y;
        if let Some(c) = self.classes.get_mut(&(y.round() as i64)) {
            *c -= 1;
        }
    }

    fn impurity(&self, criterion: Criterion) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        let n = self.count as f64;
        match criterion {
            Criterion::Gini => 1.0 - self.classes.values().map(|&c| (c as f64 / n).powi(2)).sum::<f64>(),
            Criterion::Entropy => -self
                .classes
                .values()
                .filter(|&&c| c > 0)
                .map(|&c| {
                    let p = c as f64 / n;
                    p * p.ln()
                })
                .sum::<f64>(),
            // Var = E[X²] - E[X]²
            Criterion::SquaredError => (self.sq_sum / n - (self.sum / n).powi(2)).max(0.0),
        }
    }

    fn leaf_value(&self, criterion: Criterion) -> f64 {
        if criterion.is_classification() {
            // majority class, smallest code on ties
            self.classes
                .iter()
                .fold((0i64, 0usize), |best, (&class, &count)| if count > best.1 { (class, count) } else { best })
                .0 as f64
        } else if self.count == 0 {
            0.0
        } else {
            self.sum / self.count as f64
        }
    }
}

/// Decision tree model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    root: Option<TreeNode>,
    /// Maximum depth; unlimited when `None`
    pub max_depth: Option<usize>,
    /// Minimum samples to split
    pub min_samples_split: usize,
    /// Minimum samples in leaf
    pub min_samples_leaf: usize,
    /// Features sampled per split; all when `None`
    pub max_features: Option<usize>,
    pub criterion: Criterion,
    pub random_state: Option<u64>,
}

impl DecisionTree {
    pub fn new_classifier() -> Self {
        Self::with_criterion(Criterion::Gini)
    }

    pub fn new_regressor() -> Self {
        Self::with_criterion(Criterion::SquaredError)
    }

    pub fn with_criterion(criterion: Criterion) -> Self {
        Self {
            root: None,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
            criterion,
            random_state: None,
        }
    }

    pub fn with_max_depth(mut self, depth: Option<usize>) -> Self {
        self.max_depth = depth;
        self
    }

    pub fn with_min_samples_split(mut self, min_samples: usize) -> Self {
        self.min_samples_split = min_samples;
        self
    }

    pub fn with_min_samples_leaf(mut self, min_samples: usize) -> Self {
        self.min_samples_leaf = min_samples;
        self
    }

    pub fn with_max_features(mut self, max_features: Option<usize>) -> Self {
        self.max_features = max_features;
        self
    }

    pub fn with_random_state(mut self, seed: Option<u64>) -> Self {
        self.random_state = seed;
        self
    }

    pub fn root(&self) -> Option<&TreeNode> {
        self.root.as_ref()
    }

    fn stats(y: &Array1<f64>, indices: &[usize]) -> SideStats {
        let mut stats = SideStats::default();
        for &i in indices {
            stats.add(y[i]);
        }
        stats
    }

    fn build(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        indices: &[usize],
        depth: usize,
        rng: &mut ChaCha8Rng,
    ) -> TreeNode {
        let node_stats = Self::stats(y, indices);
        let parent_impurity = node_stats.impurity(self.criterion);
        let leaf = TreeNode::Leaf {
            value: node_stats.leaf_value(self.criterion),
            n_samples: indices.len(),
        };

        if indices.len() < self.min_samples_split
            || indices.len() < 2 * self.min_samples_leaf
            || self.max_depth.is_some_and(|d| depth >= d)
            || parent_impurity <= 1e-12
        {
            return leaf;
        }

        let n_features = x.ncols();
        let features: Vec<usize> = match self.max_features {
            Some(k) if k < n_features => sample(rng, n_features, k.max(1)).into_vec(),
            _ => (0..n_features).collect(),
        };

        // first feature wins on ties so the tree is deterministic
        let mut best: Option<(usize, f64, f64)> = None;
        for feature in features {
            if let Some((threshold, impurity)) = self.best_threshold(x, y, indices, feature, &node_stats) {
                if best.map_or(true, |(_, _, b)| impurity < b) {
                    best = Some((feature, threshold, impurity));
                }
            }
        }

        match best {
            Some((feature_idx, threshold, impurity)) if impurity < parent_impurity - 1e-12 => {
                let (left_idx, right_idx): (Vec<usize>, Vec<usize>) =
                    indices.iter().partition(|&&i| x[[i, feature_idx]] <= threshold);
                let left = self.build(x, y, &left_idx, depth + 1, rng);
                let right = self.build(x, y, &right_idx, depth + 1, rng);
                TreeNode::Split {
                    feature_idx,
                    threshold,
                    left: Box::new(left),
                    right: Box::new(right),
                }
            }
            _ => leaf,
        }
    }

    /// Best (threshold, weighted child impurity) for one feature, from a
    /// single sweep over the rows sorted by that feature
    fn best_threshold(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        indices: &[usize],
        feature: usize,
        node_stats: &SideStats,
    ) -> Option<(f64, f64)> {
        let mut order = indices.to_vec();
        order.sort_by(|&a, &b| x[[a, feature]].total_cmp(&x[[b, feature]]));

        let n = order.len();
        let mut left = SideStats::default();
        let mut right = node_stats.clone();
        let mut best: Option<(f64, f64)> = None;

        for pos in 0..n - 1 {
            let i = order[pos];
            left.add(y[i]);
            right.remove(y[i]);

            let (current, next) = (x[[i, feature]], x[[order[pos + 1], feature]]);
            if current == next || left.count < self.min_samples_leaf || right.count < self.min_samples_leaf {
                continue;
            }
            let impurity = (left.count as f64 * left.impurity(self.criterion)
                + right.count as f64 * right.impurity(self.criterion))
                / n as f64;
            if best.map_or(true, |(_, b)| impurity < b) {
                best = Some(((current + next) / 2.0, impurity));
            }
        }
        best
    }
}

impl Estimator for DecisionTree {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_shapes(x, y)?;
        if self.criterion.is_classification() {
            check_class_labels(y)?;
        }
        if self.min_samples_split < 2 || self.min_samples_leaf < 1 {
            return Err(PipelineError::Fit(
                "min_samples_split must be >= 2 and min_samples_leaf >= 1".to_string(),
            ));
        }
        let mut rng = match self.random_state {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };
        let indices: Vec<usize> = (0..x.nrows()).collect();
        self.root = Some(self.build(x, y, &indices, 0, &mut rng));
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let root = self.root.as_ref().ok_or(PipelineError::ModelNotFitted)?;
        Ok(Array1::from_iter(x.rows().into_iter().map(|row| root.predict(row))))
    }
}
