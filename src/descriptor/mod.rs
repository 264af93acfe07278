//! Typed pipeline descriptor
//!
//! The descriptor is built once from a configuration document and is never
//! mutated afterwards. `validate` enforces the invariants that do not depend
//! on how the descriptor was built, so programmatic and deserialized
//! descriptors get the same checks as loaded ones.

mod dataset;
mod model;
mod preprocess;

pub use dataset::{DatasetFormat, DatasetSpec, ReadOptions, SplitSpec};
pub use model::{ModelSpec, ParamValue, Params, SearchArguments, SearchMethod, SearchSpec, TaskType};
pub use preprocess::{EncodingMethod, ImputeStrategy, PreprocessStep, ScaleMethod, ScaleTarget};

use crate::error::{PipelineError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Ordered, non-empty list of target column names
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TargetSpec(Vec<String>);

impl TargetSpec {
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(columns.into_iter().map(Into::into).collect())
    }

    pub fn columns(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, column: &str) -> bool {
        self.0.iter().any(|c| c == column)
    }
}

/// The complete, validated pipeline description
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineDescriptor {
    #[serde(default)]
    pub dataset: DatasetSpec,
    pub model: ModelSpec,
    pub target: TargetSpec,
}

impl PipelineDescriptor {
    pub fn new(dataset: DatasetSpec, model: ModelSpec, target: TargetSpec) -> Self {
        Self { dataset, model, target }
    }

    /// Check every invariant; errors name the offending key path
    pub fn validate(&self) -> Result<()> {
        self.validate_split()?;
        self.validate_preprocess()?;
        self.validate_model()?;
        self.validate_target()
    }

    fn validate_split(&self) -> Result<()> {
        let split = &self.dataset.split;
        if !(split.test_size > 0.0 && split.test_size < 1.0) {
            return Err(PipelineError::config(
                "dataset.split.test_size",
                format!("must be strictly between 0 and 1, got {}", split.test_size),
            ));
        }
        if split.stratify {
            if !split.shuffle {
                return Err(PipelineError::config(
                    "dataset.split.stratify",
                    "stratified splitting requires `shuffle: true`",
                ));
            }
            if !self.model.task_type.is_classification() {
                return Err(PipelineError::config(
                    "dataset.split.stratify",
                    "stratified splitting is only defined for classification",
                ));
            }
        }
        Ok(())
    }

    fn validate_preprocess(&self) -> Result<()> {
        for step in &self.dataset.preprocess {
            if let PreprocessStep::Scale { target, .. } = step {
                if target.includes_outputs() && self.model.task_type.is_classification() {
                    return Err(PipelineError::config(
                        "dataset.preprocess.scale.target",
                        "class labels cannot be scaled; use `inputs` for classification",
                    ));
                }
            }
        }
        Ok(())
    }

    fn validate_model(&self) -> Result<()> {
        if self.model.algorithm.trim().is_empty() {
            return Err(PipelineError::config("model.algorithm", "must not be empty"));
        }
        if let Some(search) = &self.model.search {
            let args = &search.arguments;
            if args.cv < 2 {
                return Err(PipelineError::config(
                    "model.hyperparameter_search.arguments.cv",
                    format!("needs at least 2 folds, got {}", args.cv),
                ));
            }
            if args.n_iter == 0 {
                return Err(PipelineError::config(
                    "model.hyperparameter_search.arguments.n_iter",
                    "must be a positive integer",
                ));
            }
            if search.parameter_grid.is_empty() {
                return Err(PipelineError::config(
                    "model.hyperparameter_search.parameter_grid",
                    "must list at least one parameter",
                ));
            }
            for (name, values) in &search.parameter_grid {
                if values.is_empty() {
                    return Err(PipelineError::config(
                        format!("model.hyperparameter_search.parameter_grid.{}", name),
                        "must list at least one candidate value",
                    ));
                }
            }
        }
        Ok(())
    }

    fn validate_target(&self) -> Result<()> {
        if self.target.is_empty() {
            return Err(PipelineError::config("target", "must name at least one column"));
        }
        let mut seen = HashSet::new();
        for column in self.target.columns() {
            if column.trim().is_empty() {
                return Err(PipelineError::config("target", "column names must not be empty"));
            }
            if !seen.insert(column.as_str()) {
                return Err(PipelineError::config(
                    "target",
                    format!("column `{}` is listed twice", column),
                ));
            }
        }
        Ok(())
    }
}
