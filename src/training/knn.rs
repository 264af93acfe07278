//! K-Nearest Neighbors classifier and regressor

use super::{check_class_labels, check_shapes, Estimator};
use crate::error::{PipelineError, Result};
use ndarray::{Array1, Array2, ArrayView1};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Distance metric for KNN
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceMetric {
    /// Euclidean distance (L2)
    #[default]
    Euclidean,
    /// Manhattan distance (L1)
    Manhattan,
}

impl DistanceMetric {
    fn distance(self, a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
        match self {
            DistanceMetric::Euclidean => a
                .iter()
                .zip(b.iter())
                .map(|(x, y)| (x - y).powi(2))
                .sum::<f64>()
                .sqrt(),
            DistanceMetric::Manhattan => a.iter().zip(b.iter()).map(|(x, y)| (x - y).abs()).sum(),
        }
    }
}

/// Weighting scheme for neighbors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WeightScheme {
    /// All neighbors have equal weight
    #[default]
    Uniform,
    /// Closer neighbors have more weight (inverse distance)
    Distance,
}

/// Nearest-neighbor model; votes for classification, averages for regression
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Knn {
    pub n_neighbors: usize,
    pub metric: DistanceMetric,
    pub weights: WeightScheme,
    is_classification: bool,
    x_train: Option<Array2<f64>>,
    y_train: Option<Array1<f64>>,
}

impl Knn {
    pub fn classifier(n_neighbors: usize) -> Self {
        Self::new(n_neighbors, true)
    }

    pub fn regressor(n_neighbors: usize) -> Self {
        Self::new(n_neighbors, false)
    }

    fn new(n_neighbors: usize, is_classification: bool) -> Self {
        Self {
            n_neighbors,
            metric: DistanceMetric::default(),
            weights: WeightScheme::default(),
            is_classification,
            x_train: None,
            y_train: None,
        }
    }

    pub fn with_metric(mut self, metric: DistanceMetric) -> Self {
        self.metric = metric;
        self
    }

    pub fn with_weights(mut self, weights: WeightScheme) -> Self {
        self.weights = weights;
        self
    }

    fn predict_row(&self, row: ArrayView1<f64>, x_train: &Array2<f64>, y_train: &Array1<f64>) -> f64 {
        let mut neighbors: Vec<(f64, f64)> = x_train
            .rows()
            .into_iter()
            .zip(y_train.iter())
            .map(|(train_row, &target)| (self.metric.distance(row, train_row), target))
            .collect();
        let k = self.n_neighbors.min(neighbors.len());
        neighbors.sort_by(|a, b| a.0.total_cmp(&b.0));
        neighbors.truncate(k);

        let weight = |distance: f64| match self.weights {
            WeightScheme::Uniform => 1.0,
            WeightScheme::Distance => 1.0 / distance.max(1e-12),
        };

        if self.is_classification {
            // ties go to the smallest class code
            let mut votes: BTreeMap<i64, f64> = BTreeMap::new();
            for &(distance, target) in &neighbors {
                *votes.entry(target.round() as i64).or_default() += weight(distance);
            }
            votes
                .into_iter()
                .fold(None, |best: Option<(i64, f64)>, (class, w)| match best {
                    Some((_, bw)) if bw >= w => best,
                    _ => Some((class, w)),
                })
                .map(|(class, _)| class as f64)
                .unwrap_or(0.0)
        } else {
            let (sum, total) = neighbors
                .iter()
                .fold((0.0, 0.0), |(s, t), &(d, target)| (s + weight(d) * target, t + weight(d)));
            sum / total
        }
    }
}

impl Estimator for Knn {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_shapes(x, y)?;
        if self.is_classification {
            check_class_labels(y)?;
        }
        if self.n_neighbors == 0 {
            return Err(PipelineError::Fit("n_neighbors must be at least 1".to_string()));
        }
        self.x_train = Some(x.clone());
        self.y_train = Some(y.clone());
        Ok(())
    }

    /// Parallel over query rows
    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let (Some(x_train), Some(y_train)) = (self.x_train.as_ref(), self.y_train.as_ref()) else {
            return Err(PipelineError::ModelNotFitted);
        };
        let predictions: Vec<f64> = (0..x.nrows())
            .into_par_iter()
            .map(|i| self.predict_row(x.row(i), x_train, y_train))
            .collect();
        Ok(Array1::from_vec(predictions))
    }
}
