//! Cross-validation index splits

use crate::error::{PipelineError, Result};
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Cross-validation strategy
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum CVStrategy {
    /// Contiguous folds of near-equal size
    KFold { n_splits: usize },
    /// Folds keep the class distribution of the target
    StratifiedKFold { n_splits: usize },
}

impl CVStrategy {
    pub fn n_splits(&self) -> usize {
        match self {
            CVStrategy::KFold { n_splits } | CVStrategy::StratifiedKFold { n_splits } => *n_splits,
        }
    }
}

/// A single train/test split
#[derive(Debug, Clone, PartialEq)]
pub struct CVSplit {
    pub train_indices: Vec<usize>,
    pub test_indices: Vec<usize>,
    pub fold_idx: usize,
}

/// Cross-validation splitter. Folds follow row order.
#[derive(Debug, Clone)]
pub struct CrossValidator {
    strategy: CVStrategy,
}

impl CrossValidator {
    pub fn new(strategy: CVStrategy) -> Self {
        Self { strategy }
    }

    /// Generate train/test splits for the target `y`
    pub fn split(&self, y: &Array1<f64>) -> Result<Vec<CVSplit>> {
        let n_samples = y.len();
        let n_splits = self.strategy.n_splits();
        if n_splits < 2 {
            return Err(PipelineError::Fit("cross validation needs at least 2 folds".to_string()));
        }
        if n_samples < n_splits {
            return Err(PipelineError::Fit(format!(
                "cannot make {} folds from {} training rows",
                n_splits, n_samples
            )));
        }

        let folds = match self.strategy {
            CVStrategy::KFold { .. } => {
                let indices: Vec<usize> = (0..n_samples).collect();
                let base = n_samples / n_splits;
                let remainder = n_samples % n_splits;
                let mut folds = Vec::with_capacity(n_splits);
                let mut start = 0;
                for i in 0..n_splits {
                    let size = if i < remainder { base + 1 } else { base };
                    folds.push(indices[start..start + size].to_vec());
                    start += size;
                }
                folds
            }
            CVStrategy::StratifiedKFold { .. } => {
                let mut by_class: BTreeMap<i64, Vec<usize>> = BTreeMap::new();
                for (idx, &val) in y.iter().enumerate() {
                    by_class.entry(val.round() as i64).or_default().push(idx);
                }
                // deal each class round-robin, continuing where the last one
                // stopped so fold sizes stay balanced
                let mut folds = vec![Vec::new(); n_splits];
                let mut next = 0;
                for indices in by_class.into_values() {
                    for idx in indices {
                        folds[next % n_splits].push(idx);
                        next += 1;
                    }
                }
                for fold in &mut folds {
                    fold.sort_unstable();
                }
                folds
            }
        };

        Ok((0..n_splits)
            .map(|fold_idx| CVSplit {
                test_indices: folds[fold_idx].clone(),
                train_indices: folds
                    .iter()
                    .enumerate()
                    .filter(|(i, _)| *i != fold_idx)
                    .flat_map(|(_, f)| f.iter().copied())
                    .collect(),
                fold_idx,
            })
            .collect())
    }
}
