//! Stage-by-stage execution of a pipeline descriptor

use super::{EvaluationReport, FittedPipeline, FittedTarget, RunOptions, Stage};
use crate::dataset::{column_names, require_columns, train_test_split, DatasetReader, PolarsReader};
use crate::descriptor::{PipelineDescriptor, TaskType};
use crate::error::{PipelineError, Result};
use crate::preprocessing::{LabelMap, Preprocessor};
use crate::search::HyperparameterSearch;
use crate::training::{column_to_array1, columns_to_array2, Estimator, ModelFactory, ModelRegistry};
use chrono::Utc;
use ndarray::Array1;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Instant;
use tracing::{error, info};

/// Wall-clock time spent in one stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageTiming {
    pub stage: Stage,
    pub elapsed_secs: f64,
}

/// Result of a successful run
#[derive(Debug, Clone)]
pub struct PipelineRun<M> {
    pub pipeline: FittedPipeline<M>,
    /// `None` when no model was kept (`refit: false`)
    pub evaluation: Option<EvaluationReport>,
    /// Completed stages, in execution order
    pub stages: Vec<StageTiming>,
    pub train_rows: usize,
    pub test_rows: usize,
}

impl<M> PipelineRun<M> {
    pub fn total_secs(&self) -> f64 {
        self.stages.iter().map(|s| s.elapsed_secs).sum()
    }

    pub fn ran(&self, stage: Stage) -> bool {
        self.stages.iter().any(|s| s.stage == stage)
    }
}

/// Drives a [`PipelineDescriptor`] through its collaborators
pub struct PipelineDispatcher<R = PolarsReader, F = ModelRegistry> {
    reader: R,
    factory: F,
    options: RunOptions,
}

impl PipelineDispatcher {
    /// Dispatcher with the default polars reader and model registry
    pub fn new() -> Self {
        Self::with_components(PolarsReader::new(), ModelRegistry::new())
    }
}

impl Default for PipelineDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: DatasetReader, F: ModelFactory> PipelineDispatcher<R, F> {
    pub fn with_components(reader: R, factory: F) -> Self {
        Self {
            reader,
            factory,
            options: RunOptions::default(),
        }
    }

    pub fn with_options(mut self, options: RunOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.options.seed = Some(seed);
        self
    }

    pub fn options(&self) -> &RunOptions {
        &self.options
    }

    /// Load the dataset at `path` and run every stage
    pub fn run(&self, descriptor: &PipelineDescriptor, path: impl AsRef<Path>) -> Result<PipelineRun<F::Model>> {
        descriptor.validate()?;
        let mut stages = Vec::new();
        let df = timed(Stage::Load, &mut stages, || {
            self.reader.read(path.as_ref(), &descriptor.dataset)
        })?;
        self.execute(descriptor, df, stages)
    }

    /// Run every stage after `load` on an in-memory frame
    pub fn run_frame(&self, descriptor: &PipelineDescriptor, df: DataFrame) -> Result<PipelineRun<F::Model>> {
        descriptor.validate()?;
        self.execute(descriptor, df, Vec::new())
    }

    fn execute(
        &self,
        descriptor: &PipelineDescriptor,
        df: DataFrame,
        mut stages: Vec<StageTiming>,
    ) -> Result<PipelineRun<F::Model>> {
        let targets = descriptor.target.columns();
        let model_spec = &descriptor.model;
        let task = model_spec.task_type;
        let seed = self.options.seed;

        let (split, features, labels) = timed(Stage::Split, &mut stages, || {
            require_columns(&df, targets)?;
            let features: Vec<String> = column_names(&df)
                .into_iter()
                .filter(|c| !descriptor.target.contains(c))
                .collect();
            if features.is_empty() {
                return Err(PipelineError::Dataset(
                    "no feature columns left once the targets are removed".to_string(),
                ));
            }
            // fitted on every row so the test split cannot hold an unseen class
            let labels = targets
                .iter()
                .map(|t| label_map(task, &df, t))
                .collect::<Result<Vec<_>>>()?;

            let split_spec = &descriptor.dataset.split;
            let stratify_by = split_spec.stratify.then(|| targets[0].as_str());
            let split = train_test_split(&df, split_spec, stratify_by, seed)?;
            info!(
                train_rows = split.train.height(),
                test_rows = split.test.height(),
                shuffle = split_spec.shuffle,
                "Dataset split"
            );
            Ok((split, features, labels))
        })?;

        let (preprocessor, train, test, x) = timed(Stage::Preprocess, &mut stages, || {
            let (preprocessor, train) =
                Preprocessor::fit(&descriptor.dataset.preprocess, &split.train, &features, targets)?;
            let test = preprocessor.transform(&split.test)?;
            if train.height() == 0 || test.height() == 0 {
                return Err(PipelineError::Dataset(format!(
                    "preprocessing left {} train and {} test rows",
                    train.height(),
                    test.height()
                )));
            }
            let x = columns_to_array2(&train, preprocessor.input_columns())?;
            Ok((preprocessor, train, test, x))
        })?;

        let models = timed(Stage::BuildModel, &mut stages, || {
            targets
                .iter()
                .map(|_| self.factory.create(task, &model_spec.algorithm, &model_spec.arguments, seed))
                .collect::<Result<Vec<_>>>()
        })?;

        let fitted_targets = match &model_spec.search {
            Some(search_spec) => timed(Stage::Search, &mut stages, || {
                targets
                    .iter()
                    .zip(&labels)
                    .map(|(column, labels)| {
                        let y = target_vector(&train, column, labels.as_ref())?;
                        let (report, model) = HyperparameterSearch::new(
                            &self.factory,
                            task,
                            &model_spec.algorithm,
                            &model_spec.arguments,
                            search_spec,
                        )
                        .with_seed(seed)
                        .run(&x, &y)?;
                        Ok(FittedTarget {
                            column: column.clone(),
                            model,
                            labels: labels.clone(),
                            search: Some(report),
                        })
                    })
                    .collect::<Result<Vec<_>>>()
            })?,
            None => timed(Stage::Fit, &mut stages, || {
                targets
                    .iter()
                    .zip(&labels)
                    .zip(models)
                    .map(|((column, labels), mut model)| {
                        let y = target_vector(&train, column, labels.as_ref())?;
                        model.fit(&x, &y)?;
                        info!(target = %column, rows = x.nrows(), features = x.ncols(), "Model fitted");
                        Ok(FittedTarget {
                            column: column.clone(),
                            model: Some(model),
                            labels: labels.clone(),
                            search: None,
                        })
                    })
                    .collect::<Result<Vec<_>>>()
            })?,
        };

        let pipeline = FittedPipeline {
            descriptor: descriptor.clone(),
            feature_columns: features,
            preprocessor,
            targets: fitted_targets,
            created_at: Utc::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        };

        let evaluation = if pipeline.has_model() {
            Some(timed(Stage::Evaluate, &mut stages, || pipeline.evaluate_transformed(&test))?)
        } else {
            info!("No model kept after search; skipping evaluation");
            None
        };

        Ok(PipelineRun {
            pipeline,
            evaluation,
            stages,
            train_rows: train.height(),
            test_rows: test.height(),
        })
    }
}

/// Run one stage, tagging any error with it and recording its duration
fn timed<T>(stage: Stage, stages: &mut Vec<StageTiming>, f: impl FnOnce() -> Result<T>) -> Result<T> {
    let start = Instant::now();
    info!(stage = %stage, "Stage started");
    match f() {
        Ok(value) => {
            let elapsed = start.elapsed();
            info!(stage = %stage, elapsed = ?elapsed, "Stage finished");
            stages.push(StageTiming {
                stage,
                elapsed_secs: elapsed.as_secs_f64(),
            });
            Ok(value)
        }
        Err(e) => {
            error!(stage = %stage, error = %e, "Stage failed");
            Err(e.in_stage(stage))
        }
    }
}

/// String class labels need a mapping to numeric codes
fn label_map(task: TaskType, df: &DataFrame, column: &str) -> Result<Option<LabelMap>> {
    if !task.is_classification() {
        return Ok(None);
    }
    let series = df.column(column)?.as_materialized_series();
    let dtype = series.dtype();
    if dtype.is_primitive_numeric() || dtype == &DataType::Boolean {
        return Ok(None);
    }
    LabelMap::fit(series).map(Some)
}

fn target_vector(df: &DataFrame, column: &str, labels: Option<&LabelMap>) -> Result<Array1<f64>> {
    match labels {
        Some(labels) => Ok(Array1::from_vec(
            labels.encode(df.column(column)?.as_materialized_series())?,
        )),
        None => column_to_array1(df, column),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{
        DatasetSpec, ImputeStrategy, ModelSpec, ParamValue, PreprocessStep, ScaleMethod, ScaleTarget,
        SearchArguments, SearchMethod, SearchSpec, SplitSpec, TargetSpec,
    };

    fn regression_frame() -> DataFrame {
        let x: Vec<f64> = (0..40).map(|i| i as f64).collect();
        let z: Vec<f64> = (0..40).map(|i| (i % 5) as f64).collect();
        let y: Vec<f64> = x.iter().zip(&z).map(|(x, z)| 3.0 * x - 2.0 * z + 1.0).collect();
        df!("x" => x, "z" => z, "y" => y).unwrap()
    }

    fn classification_frame() -> DataFrame {
        let a: Vec<f64> = (0..30).map(|i| (i % 10) as f64).collect();
        let label: Vec<&str> = a.iter().map(|&v| if v < 5.0 { "low" } else { "high" }).collect();
        df!("a" => a, "label" => label).unwrap()
    }

    fn regression_descriptor() -> PipelineDescriptor {
        PipelineDescriptor::new(
            DatasetSpec::default().with_split(SplitSpec::new(0.25, false)),
            ModelSpec::new(TaskType::Regression, "LinearRegression"),
            TargetSpec::new(["y"]),
        )
    }

    #[test]
    fn test_linear_run_without_search() {
        let run = PipelineDispatcher::new()
            .run_frame(&regression_descriptor(), regression_frame())
            .unwrap();

        assert_eq!(run.train_rows, 30);
        assert_eq!(run.test_rows, 10);
        let order: Vec<Stage> = run.stages.iter().map(|s| s.stage).collect();
        assert_eq!(
            order,
            vec![Stage::Split, Stage::Preprocess, Stage::BuildModel, Stage::Fit, Stage::Evaluate]
        );
        assert!(!run.ran(Stage::Search));

        let metrics = run.evaluation.unwrap();
        assert!(metrics.metrics("y").unwrap().r2.unwrap() > 0.999);
    }

    #[test]
    fn test_scaled_target_predicted_in_original_units() {
        let mut descriptor = regression_descriptor();
        descriptor.dataset.preprocess = vec![PreprocessStep::scale(ScaleMethod::Standard, ScaleTarget::All)];
        let run = PipelineDispatcher::new()
            .run_frame(&descriptor, regression_frame())
            .unwrap();

        let new = df!("x" => &[100.0], "z" => &[0.0]).unwrap();
        let predictions = run.pipeline.predict(&new).unwrap();
        let y = predictions.column("y").unwrap().f64().unwrap().get(0).unwrap();
        assert!((y - 301.0).abs() < 1e-6);
    }

    #[test]
    fn test_string_labels_round_trip() {
        let descriptor = PipelineDescriptor::new(
            DatasetSpec::default().with_split(SplitSpec::new(0.2, true)),
            ModelSpec::new(TaskType::Classification, "DecisionTree"),
            TargetSpec::new(["label"]),
        );
        let run = PipelineDispatcher::new()
            .with_seed(5)
            .run_frame(&descriptor, classification_frame())
            .unwrap();

        let fitted = &run.pipeline.targets[0];
        assert_eq!(fitted.labels.as_ref().unwrap().classes(), &["high", "low"]);
        assert_eq!(run.evaluation.unwrap().metrics("label").unwrap().accuracy, Some(1.0));

        let predictions = run.pipeline.predict(&df!("a" => &[1.0, 8.0]).unwrap()).unwrap();
        let labels: Vec<&str> = predictions.column("label").unwrap().str().unwrap().into_no_null_iter().collect();
        assert_eq!(labels, vec!["low", "high"]);
    }

    #[test]
    fn test_predict_keeps_rows_dropped_for_missing_values() {
        let mut descriptor = regression_descriptor();
        descriptor.dataset.preprocess = vec![PreprocessStep::MissingValues(ImputeStrategy::Drop)];
        let run = PipelineDispatcher::new()
            .run_frame(&descriptor, regression_frame())
            .unwrap();

        let new = df!(
            "x" => &[Some(1.0), None, Some(3.0)],
            "z" => &[Some(0.0), Some(0.0), Some(0.0)]
        )
        .unwrap();
        let predictions = run.pipeline.predict(&new).unwrap();
        assert_eq!(predictions.height(), 3);

        let y = predictions.column("y").unwrap().f64().unwrap();
        assert_eq!(y.null_count(), 1);
        assert!(y.get(1).is_none());
        assert!((y.get(0).unwrap() - 4.0).abs() < 1e-6);
        assert!((y.get(2).unwrap() - 10.0).abs() < 1e-6);
    }

    #[test]
    fn test_fractional_class_labels_fail_in_fit() {
        let a: Vec<f64> = (0..20).map(|i| i as f64).collect();
        let label: Vec<f64> = a.iter().map(|&v| if v < 10.0 { 0.2 } else { 0.4 }).collect();
        let descriptor = PipelineDescriptor::new(
            DatasetSpec::default().with_split(SplitSpec::new(0.2, false)),
            ModelSpec::new(TaskType::Classification, "DecisionTree"),
            TargetSpec::new(["label"]),
        );
        let err = PipelineDispatcher::new()
            .run_frame(&descriptor, df!("a" => a, "label" => label).unwrap())
            .unwrap_err();
        assert_eq!(err.stage(), Some(Stage::Fit));
        assert!(err.is_fit());
    }

    #[test]
    fn test_missing_target_fails_in_split() {
        let mut descriptor = regression_descriptor();
        descriptor.target = TargetSpec::new(["price"]);
        let err = PipelineDispatcher::new()
            .run_frame(&descriptor, regression_frame())
            .unwrap_err();
        assert_eq!(err.stage(), Some(Stage::Split));
        assert!(err.is_dataset());
    }

    #[test]
    fn test_unknown_algorithm_fails_in_build_model() {
        let mut descriptor = regression_descriptor();
        descriptor.model.algorithm = "NeuralOracle".to_string();
        let err = PipelineDispatcher::new()
            .run_frame(&descriptor, regression_frame())
            .unwrap_err();
        assert_eq!(err.stage(), Some(Stage::BuildModel));
        assert!(err.is_fit());
    }

    #[test]
    fn test_invalid_descriptor_fails_before_any_stage() {
        let mut descriptor = regression_descriptor();
        descriptor.dataset.split.test_size = 1.5;
        let err = PipelineDispatcher::new()
            .run_frame(&descriptor, regression_frame())
            .unwrap_err();
        assert_eq!(err.stage(), None);
        assert!(err.is_config());
    }

    #[test]
    fn test_search_without_refit_skips_evaluation() {
        let mut descriptor = regression_descriptor();
        descriptor.model = ModelSpec::new(TaskType::Regression, "Ridge").with_search(
            SearchSpec::new(SearchMethod::GridSearch)
                .with_param("alpha", vec![ParamValue::Float(0.1), ParamValue::Float(10.0)])
                .with_arguments(SearchArguments {
                    cv: 3,
                    refit: false,
                    ..SearchArguments::default()
                }),
        );
        let run = PipelineDispatcher::new()
            .run_frame(&descriptor, regression_frame())
            .unwrap();

        assert!(run.ran(Stage::Search));
        assert!(!run.ran(Stage::Fit));
        assert!(!run.pipeline.has_model());
        assert!(run.evaluation.is_none());
        assert_eq!(run.pipeline.targets[0].search.as_ref().unwrap().candidates.len(), 2);

        let err = run.pipeline.predict(&regression_frame()).unwrap_err();
        assert!(matches!(err, PipelineError::ModelNotFitted));
    }

    #[test]
    fn test_multiple_targets_fitted_independently() {
        let mut df = regression_frame();
        let w: Vec<f64> = (0..40).map(|i| 0.5 * i as f64).collect();
        df.with_column(Series::new("w".into(), w)).unwrap();
        let mut descriptor = regression_descriptor();
        descriptor.target = TargetSpec::new(["y", "w"]);
        descriptor.dataset.preprocess = vec![PreprocessStep::MissingValues(ImputeStrategy::Mean)];

        let run = PipelineDispatcher::new().run_frame(&descriptor, df).unwrap();
        assert_eq!(run.pipeline.targets.len(), 2);
        assert_eq!(run.pipeline.feature_columns, vec!["x", "z"]);
        assert_eq!(run.evaluation.unwrap().targets.len(), 2);
    }
}
