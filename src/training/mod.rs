//! Model training collaborator
//!
//! The dispatcher builds estimators through the [`ModelFactory`] trait and
//! drives them through [`Estimator`]. [`ModelRegistry`] is the default
//! factory; its algorithms are listed in [`CATALOG`].

pub mod cross_validation;
mod data;
pub mod decision_tree;
pub mod knn;
pub mod linear_models;
pub mod metrics;
mod params;
pub mod random_forest;
mod registry;

pub use cross_validation::{CVSplit, CVStrategy, CrossValidator};
pub use data::{column_to_array1, columns_to_array2};
pub use metrics::ModelMetrics;
pub use registry::{find_algorithm, AlgorithmInfo, ModelRegistry, ParamInfo, TrainedModel, CATALOG};

use crate::descriptor::{Params, TaskType};
use crate::error::{PipelineError, Result};
use ndarray::{Array1, Array2};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// A trainable model over a numeric feature matrix and one target vector
pub trait Estimator: Send + Sync {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()>;

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>>;
}

/// Builds untrained estimators from an algorithm name and hyperparameters
pub trait ModelFactory: Sync {
    type Model: Estimator + Clone + Serialize + DeserializeOwned;

    /// `seed` seeds any randomness in the model unless a parameter overrides it
    fn create(&self, task: TaskType, algorithm: &str, params: &Params, seed: Option<u64>) -> Result<Self::Model>;
}

pub(crate) fn check_shapes(x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
    if x.nrows() != y.len() {
        return Err(PipelineError::Fit(format!(
            "feature matrix has {} rows but target has {}",
            x.nrows(),
            y.len()
        )));
    }
    if x.nrows() == 0 {
        return Err(PipelineError::Fit("no training rows".to_string()));
    }
    Ok(())
}

/// Class targets are integer codes; anything else would merge classes
pub(crate) fn check_class_labels(y: &Array1<f64>) -> Result<()> {
    match y.iter().find(|v| !v.is_finite() || v.fract() != 0.0) {
        Some(v) => Err(PipelineError::Fit(format!(
            "classification target has non-integer label {}; use integer or string labels",
            v
        ))),
        None => Ok(()),
    }
}
