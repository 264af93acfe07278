//! Random Forest implementation

use super::decision_tree::{Criterion, DecisionTree};
use super::{check_class_labels, check_shapes, Estimator};
use crate::error::{PipelineError, Result};
use ndarray::{Array1, Array2, Axis};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Strategy for features considered at each split
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum MaxFeatures {
    /// sqrt for classifiers, every feature for regressors
    Auto,
    /// Square root of n_features
    Sqrt,
    /// Log2 of n_features
    Log2,
    /// Fraction of n_features
    Fraction(f64),
    /// Fixed number
    Fixed(usize),
    /// All features
    All,
}

/// Random Forest model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForest {
    trees: Vec<DecisionTree>,
    pub n_estimators: usize,
    /// Maximum depth per tree
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub max_features: MaxFeatures,
    /// Bootstrap sampling
    pub bootstrap: bool,
    pub criterion: Criterion,
    pub random_state: Option<u64>,
}

impl RandomForest {
    pub fn new_classifier(n_estimators: usize) -> Self {
        Self::new(n_estimators, Criterion::Gini)
    }

    pub fn new_regressor(n_estimators: usize) -> Self {
        Self::new(n_estimators, Criterion::SquaredError)
    }

    fn new(n_estimators: usize, criterion: Criterion) -> Self {
        Self {
            trees: Vec::new(),
            n_estimators,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: MaxFeatures::Auto,
            bootstrap: true,
            criterion,
            random_state: None,
        }
    }

    pub fn with_n_estimators(mut self, n_estimators: usize) -> Self {
        self.n_estimators = n_estimators;
        self
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

    pub fn with_max_features(mut self, max_features: MaxFeatures) -> Self {
        self.max_features = max_features;
        self
    }

    pub fn with_bootstrap(mut self, bootstrap: bool) -> Self {
        self.bootstrap = bootstrap;
        self
    }

    pub fn with_criterion(mut self, criterion: Criterion) -> Self {
        self.criterion = criterion;
        self
    }

    pub fn with_random_state(mut self, seed: Option<u64>) -> Self {
        self.random_state = seed;
        self
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    fn compute_max_features(&self, n_features: usize) -> usize {
        let n = n_features as f64;
        match self.max_features {
            MaxFeatures::Auto if self.criterion.is_classification() => n.sqrt().ceil() as usize,
            MaxFeatures::Auto | MaxFeatures::All => n_features,
            MaxFeatures::Sqrt => n.sqrt().ceil() as usize,
            MaxFeatures::Log2 => n.log2().ceil() as usize,
            MaxFeatures::Fraction(f) => (n * f).ceil() as usize,
            MaxFeatures::Fixed(k) => k.min(n_features),
        }
        .clamp(1, n_features.max(1))
    }
}

impl Estimator for RandomForest {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_shapes(x, y)?;
        if self.criterion.is_classification() {
            check_class_labels(y)?;
        }
        if self.n_estimators == 0 {
            return Err(PipelineError::Fit("n_estimators must be at least 1".to_string()));
        }

        let n_samples = x.nrows();
        let max_features = self.compute_max_features(x.ncols());
        let base_seed = self
            .random_state
            .unwrap_or_else(|| ChaCha8Rng::from_entropy().gen());

        // one independent RNG stream per tree keeps the fit reproducible
        // regardless of how rayon schedules the trees
        let trees = (0..self.n_estimators)
            .into_par_iter()
            .map(|tree_idx| -> Result<DecisionTree> {
                let seed = base_seed.wrapping_add(tree_idx as u64);
                let mut rng = ChaCha8Rng::seed_from_u64(seed);

                let sample_indices: Vec<usize> = if self.bootstrap {
                    (0..n_samples).map(|_| rng.gen_range(0..n_samples)).collect()
                } else {
                    (0..n_samples).collect()
                };
                let x_boot = x.select(Axis(0), &sample_indices);
                let y_boot = y.select(Axis(0), &sample_indices);

                let mut tree = DecisionTree::with_criterion(self.criterion)
                    .with_max_depth(self.max_depth)
                    .with_min_samples_split(self.min_samples_split)
                    .with_min_samples_leaf(self.min_samples_leaf)
                    .with_max_features(Some(max_features))
                    .with_random_state(Some(rng.gen()));
                tree.fit(&x_boot, &y_boot)?;
                Ok(tree)
            })
            .collect::<Result<Vec<_>>>()?;

        self.trees = trees;
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if self.trees.is_empty() {
            return Err(PipelineError::ModelNotFitted);
        }
        let per_tree = self
            .trees
            .par_iter()
            .map(|tree| tree.predict(x))
            .collect::<Result<Vec<_>>>()?;

        let n_trees = per_tree.len() as f64;
        Ok(Array1::from_shape_fn(x.nrows(), |row| {
            if self.criterion.is_classification() {
                // majority vote; smallest class code on ties
                let mut votes: BTreeMap<i64, usize> = BTreeMap::new();
                for prediction in &per_tree {
                    *votes.entry(prediction[row].round() as i64).or_default() += 1;
                }
                votes
                    .into_iter()
                    .fold((0i64, 0usize), |best, (class, n)| if n > best.1 { (class, n) } else { best })
                    .0 as f64
            } else {
                per_tree.iter().map(|p| p[row]).sum::<f64>() / n_trees
            }
        }))
    }
}
