//! Evaluation metrics

use crate::descriptor::TaskType;
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Metric names reported for classification
pub const CLASSIFICATION_METRICS: &[&str] = &["accuracy", "precision", "recall", "f1_score"];

/// Metric names reported for regression
pub const REGRESSION_METRICS: &[&str] = &["mse", "rmse", "mae", "r2"];

pub fn supported_metrics(task: TaskType) -> &'static [&'static str] {
    match task {
        TaskType::Classification => CLASSIFICATION_METRICS,
        TaskType::Regression => REGRESSION_METRICS,
    }
}

/// Metrics for model evaluation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelMetrics {
    /// Accuracy (classification)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accuracy: Option<f64>,
    /// Macro-averaged precision (classification)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub precision: Option<f64>,
    /// Macro-averaged recall (classification)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recall: Option<f64>,
    /// Macro-averaged F1 score (classification)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub f1_score: Option<f64>,
    /// Mean Squared Error (regression)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mse: Option<f64>,
    /// Root Mean Squared Error (regression)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rmse: Option<f64>,
    /// Mean Absolute Error (regression)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mae: Option<f64>,
    /// R-squared (regression)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub r2: Option<f64>,
    /// Number of evaluated samples
    pub n_samples: usize,
}

impl ModelMetrics {
    pub fn compute(task: TaskType, y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Self {
        match task {
            TaskType::Classification => Self::compute_classification(y_true, y_pred),
            TaskType::Regression => Self::compute_regression(y_true, y_pred),
        }
    }

    /// Accuracy plus macro precision / recall / F1 over every class seen in
    /// either labels or predictions
    pub fn compute_classification(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Self {
        let classes: BTreeSet<i64> = y_true
            .iter()
            .chain(y_pred.iter())
            .map(|v| v.round() as i64)
            .collect();

        let (mut precision, mut recall, mut f1) = (0.0, 0.0, 0.0);
        for &class in &classes {
            let (mut tp, mut fp, mut fn_) = (0usize, 0usize, 0usize);
            for (t, p) in y_true.iter().zip(y_pred.iter()) {
                let (t, p) = (t.round() as i64 == class, p.round() as i64 == class);
                match (t, p) {
                    (true, true) => tp += 1,
                    (false, true) => fp += 1,
                    (true, false) => fn_ += 1,
                    (false, false) => {}
                }
            }
            let p = ratio(tp, tp + fp);
            let r = ratio(tp, tp + fn_);
            precision += p;
            recall += r;
            f1 += if p + r > 0.0 { 2.0 * p * r / (p + r) } else { 0.0 };
        }
        let n_classes = classes.len().max(1) as f64;

        Self {
            accuracy: Some(accuracy(y_true, y_pred)),
            precision: Some(precision / n_classes),
            recall: Some(recall / n_classes),
            f1_score: Some(f1 / n_classes),
            n_samples: y_true.len(),
            ..Self::default()
        }
    }

    pub fn compute_regression(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Self {
        let n = y_true.len().max(1) as f64;
        let residuals = y_true - y_pred;
        let mse = residuals.mapv(|r| r * r).sum() / n;
        let mae = residuals.mapv(f64::abs).sum() / n;

        Self {
            mse: Some(mse),
            rmse: Some(mse.sqrt()),
            mae: Some(mae),
            r2: Some(r2(y_true, y_pred)),
            n_samples: y_true.len(),
            ..Self::default()
        }
    }

    /// (name, value) pairs that are set, in display order
    pub fn entries(&self) -> Vec<(&'static str, f64)> {
        [
            ("accuracy", self.accuracy),
            ("precision", self.precision),
            ("recall", self.recall),
            ("f1_score", self.f1_score),
            ("mse", self.mse),
            ("rmse", self.rmse),
            ("mae", self.mae),
            ("r2", self.r2),
        ]
        .into_iter()
        .filter_map(|(name, value)| value.map(|v| (name, v)))
        .collect()
    }
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

pub fn accuracy(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> f64 {
    if y_true.is_empty() {
        return 0.0;
    }
    let correct = y_true
        .iter()
        .zip(y_pred.iter())
        .filter(|(t, p)| (*t - *p).abs() < 0.5)
        .count();
    correct as f64 / y_true.len() as f64
}

pub fn r2(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> f64 {
    let mean = y_true.mean().unwrap_or(0.0);
    let ss_res: f64 = y_true.iter().zip(y_pred.iter()).map(|(t, p)| (t - p).powi(2)).sum();
    let ss_tot: f64 = y_true.iter().map(|t| (t - mean).powi(2)).sum();
    if ss_tot == 0.0 {
        // constant target: perfect only when predictions match exactly
        return if ss_res == 0.0 { 1.0 } else { 0.0 };
    }
    1.0 - ss_res / ss_tot
}

/// Score used to rank search candidates; higher is better
pub fn score(task: TaskType, y_true: &Array1<f64>, y_pred: &Array1<f64>) -> f64 {
    match task {
        TaskType::Classification => accuracy(y_true, y_pred),
        TaskType::Regression => r2(y_true, y_pred),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_classification_metrics() {
        let y_true = array![0.0, 0.0, 1.0, 1.0];
        let y_pred = array![0.0, 1.0, 1.0, 1.0];
        let m = ModelMetrics::compute_classification(&y_true, &y_pred);

        assert_eq!(m.accuracy, Some(0.75));
        // class 0: p=1, r=0.5; class 1: p=2/3, r=1
        assert!((m.precision.unwrap() - (1.0 + 2.0 / 3.0) / 2.0).abs() < 1e-12);
        assert!((m.recall.unwrap() - 0.75).abs() < 1e-12);
        assert!(m.mse.is_none());
    }

    #[test]
    fn test_regression_metrics() {
        let y_true = array![1.0, 2.0, 3.0];
        let y_pred = array![1.0, 2.0, 5.0];
        let m = ModelMetrics::compute_regression(&y_true, &y_pred);

        assert!((m.mse.unwrap() - 4.0 / 3.0).abs() < 1e-12);
        assert!((m.mae.unwrap() - 2.0 / 3.0).abs() < 1e-12);
        assert!((m.r2.unwrap() - (1.0 - 4.0 / 2.0)).abs() < 1e-12);
        assert_eq!(m.entries().len(), 4);
    }

    #[test]
    fn test_constant_target_r2() {
        let y = array![2.0, 2.0];
        assert_eq!(r2(&y, &y), 1.0);
        assert_eq!(r2(&y, &array![2.0, 3.0]), 0.0);
    }

    #[test]
    fn test_score_per_task() {
        let y = array![1.0, 0.0];
        assert_eq!(score(TaskType::Classification, &y, &y), 1.0);
        assert_eq!(supported_metrics(TaskType::Regression), REGRESSION_METRICS);
    }
}
