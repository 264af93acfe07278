//! Fitted pipeline artifact: persistence, prediction and evaluation

use crate::dataset::require_columns;
use crate::descriptor::{PipelineDescriptor, TaskType};
use crate::error::{PipelineError, Result};
use crate::preprocessing::{LabelMap, Preprocessor};
use crate::search::SearchReport;
use crate::training::{column_to_array1, columns_to_array2, Estimator, ModelMetrics};
use chrono::{DateTime, Utc};
use ndarray::{Array1, Array2};
use polars::prelude::*;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, warn};

/// Position column carried through preprocessing on the predict path
const ROW_INDEX: &str = "__row_index";

/// Model and metadata for one target column
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FittedTarget<M> {
    pub column: String,
    /// `None` when a search ran with `refit: false`
    pub model: Option<M>,
    /// Present when class labels are strings
    pub labels: Option<LabelMap>,
    pub search: Option<SearchReport>,
}

/// Everything needed to replay a fitted pipeline on new data
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FittedPipeline<M> {
    pub descriptor: PipelineDescriptor,
    /// Raw feature columns expected in new data
    pub feature_columns: Vec<String>,
    pub preprocessor: Preprocessor,
    pub targets: Vec<FittedTarget<M>>,
    pub created_at: DateTime<Utc>,
    pub version: String,
}

/// Metrics for one target column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetMetrics {
    pub target: String,
    pub metrics: ModelMetrics,
}

/// Evaluation of a fitted pipeline on labelled rows
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub task: TaskType,
    pub n_samples: usize,
    pub targets: Vec<TargetMetrics>,
}

impl EvaluationReport {
    pub fn metrics(&self, target: &str) -> Option<&ModelMetrics> {
        self.targets.iter().find(|t| t.target == target).map(|t| &t.metrics)
    }
}

impl<M> FittedPipeline<M>
where
    M: Estimator + Serialize + DeserializeOwned,
{
    pub fn task(&self) -> TaskType {
        self.descriptor.model.task_type
    }

    /// True when every target kept a fitted model
    pub fn has_model(&self) -> bool {
        self.targets.iter().all(|t| t.model.is_some())
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path.as_ref(), json)?;
        debug!(path = %path.as_ref().display(), "Pipeline saved");
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path.as_ref())?;
        let pipeline: Self = serde_json::from_str(&json)?;
        Ok(pipeline)
    }

    /// One prediction column per target, in original units and labels.
    ///
    /// The output has one row per input row. Rows removed by a `drop`
    /// missing-value step get null predictions.
    pub fn predict(&self, df: &DataFrame) -> Result<DataFrame> {
        require_columns(df, &self.feature_columns)?;
        let transformed = self
            .preprocessor
            .transform(&df.with_row_index(ROW_INDEX.into(), None)?)?;
        let x = columns_to_array2(&transformed, self.preprocessor.input_columns())?;
        let codes = self.predict_codes(&x)?;
        let mut frame = self
            .preprocessor
            .inverse_transform_outputs(&self.codes_frame(&codes)?)?;

        for (target, code) in self.targets.iter().zip(&codes) {
            if let Some(labels) = &target.labels {
                frame.with_column(labels.decode(&target.column, &code.to_vec()))?;
            }
        }

        if transformed.height() == df.height() {
            return Ok(frame);
        }
        let kept = transformed.column(ROW_INDEX)?.as_materialized_series().idx()?.clone();
        let mut positions: Vec<Option<IdxSize>> = vec![None; df.height()];
        for (i, row) in kept.into_no_null_iter().enumerate() {
            positions[row as usize] = Some(i as IdxSize);
        }
        warn!(
            rows = df.height() - transformed.height(),
            "Rows with missing values get null predictions"
        );
        let idx = IdxCa::from_iter_options("idx".into(), positions.into_iter());
        Ok(frame.take(&idx)?)
    }

    /// Metrics against the target columns of `df`
    pub fn evaluate(&self, df: &DataFrame) -> Result<EvaluationReport> {
        require_columns(df, &self.feature_columns)?;
        require_columns(df, self.descriptor.target.columns())?;
        let transformed = self.preprocessor.transform(df)?;
        self.evaluate_transformed(&transformed)
    }

    /// Metrics on a frame that already went through the preprocessor
    pub(crate) fn evaluate_transformed(&self, transformed: &DataFrame) -> Result<EvaluationReport> {
        let x = columns_to_array2(transformed, self.preprocessor.input_columns())?;
        let codes = self.predict_codes(&x)?;

        let predicted = self
            .preprocessor
            .inverse_transform_outputs(&self.codes_frame(&codes)?)?;
        let actual = self.preprocessor.inverse_transform_outputs(
            &transformed.select(self.targets.iter().map(|t| t.column.as_str()))?,
        )?;

        let task = self.task();
        let targets = self
            .targets
            .iter()
            .zip(&codes)
            .map(|(target, code)| {
                let (y_true, y_pred) = match &target.labels {
                    Some(labels) => {
                        let column = actual.column(&target.column)?.as_materialized_series();
                        (Array1::from_vec(labels.encode(column)?), code.clone())
                    }
                    None => (
                        column_to_array1(&actual, &target.column)?,
                        column_to_array1(&predicted, &target.column)?,
                    ),
                };
                Ok(TargetMetrics {
                    target: target.column.clone(),
                    metrics: ModelMetrics::compute(task, &y_true, &y_pred),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(EvaluationReport {
            task,
            n_samples: transformed.height(),
            targets,
        })
    }

    fn predict_codes(&self, x: &Array2<f64>) -> Result<Vec<Array1<f64>>> {
        self.targets
            .iter()
            .map(|target| {
                target
                    .model
                    .as_ref()
                    .ok_or(PipelineError::ModelNotFitted)?
                    .predict(x)
            })
            .collect()
    }

    /// Raw model outputs as a frame named after the targets
    fn codes_frame(&self, codes: &[Array1<f64>]) -> Result<DataFrame> {
        let columns = self
            .targets
            .iter()
            .zip(codes)
            .map(|(target, code)| Series::new(target.column.as_str().into(), code.to_vec()).into())
            .collect::<Vec<Column>>();
        Ok(DataFrame::new(columns)?)
    }
}
