//! Algorithm catalog and the default model factory

use super::decision_tree::{Criterion, DecisionTree};
use super::knn::{DistanceMetric, Knn, WeightScheme};
use super::linear_models::{LinearRegression, LogisticRegression};
use super::params::ParamReader;
use super::random_forest::{MaxFeatures, RandomForest};
use super::{Estimator, ModelFactory};
use crate::descriptor::{ParamValue, Params, TaskType};
use crate::error::{PipelineError, Result};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

/// One tunable parameter of an algorithm
#[derive(Debug, Clone, Copy)]
pub struct ParamInfo {
    pub name: &'static str,
    pub default: &'static str,
    pub description: &'static str,
}

/// A supported algorithm
#[derive(Debug, Clone, Copy)]
pub struct AlgorithmInfo {
    pub name: &'static str,
    pub tasks: &'static [TaskType],
    pub description: &'static str,
    pub params: &'static [ParamInfo],
}

impl AlgorithmInfo {
    pub fn supports(&self, task: TaskType) -> bool {
        self.tasks.contains(&task)
    }

    fn param_names(&self) -> Vec<&'static str> {
        self.params.iter().map(|p| p.name).collect()
    }
}

const fn param(name: &'static str, default: &'static str, description: &'static str) -> ParamInfo {
    ParamInfo {
        name,
        default,
        description,
    }
}

const BOTH: &[TaskType] = &[TaskType::Classification, TaskType::Regression];

const TREE_PARAMS: &[ParamInfo] = &[
    param("max_depth", "null", "maximum tree depth; null grows until leaves are pure"),
    param("min_samples_split", "2", "minimum rows needed to split a node"),
    param("min_samples_leaf", "1", "minimum rows in each leaf"),
    param("criterion", "gini | squared_error", "gini or entropy (classification), squared_error (regression)"),
    param("random_state", "run seed", "seed for feature sampling"),
];

const FOREST_PARAMS: &[ParamInfo] = &[
    param("n_estimators", "100", "number of trees"),
    param("max_depth", "null", "maximum depth per tree"),
    param("min_samples_split", "2", "minimum rows needed to split a node"),
    param("min_samples_leaf", "1", "minimum rows in each leaf"),
    param("max_features", "auto", "auto, sqrt, log2, all, an integer or a fraction"),
    param("bootstrap", "true", "sample rows with replacement for each tree"),
    param("criterion", "gini | squared_error", "gini or entropy (classification), squared_error (regression)"),
    param("random_state", "run seed", "seed for bootstrap and feature sampling"),
];

/// Every algorithm the default factory can build
pub const CATALOG: &[AlgorithmInfo] = &[
    AlgorithmInfo {
        name: "LinearRegression",
        tasks: &[TaskType::Regression],
        description: "ordinary least squares",
        params: &[param("fit_intercept", "true", "fit a bias term")],
    },
    AlgorithmInfo {
        name: "Ridge",
        tasks: &[TaskType::Regression],
        description: "least squares with an L2 penalty",
        params: &[
            param("alpha", "1.0", "L2 penalty strength"),
            param("fit_intercept", "true", "fit a bias term"),
        ],
    },
    AlgorithmInfo {
        name: "LogisticRegression",
        tasks: &[TaskType::Classification],
        description: "logistic regression, one-vs-rest for more than two classes",
        params: &[
            param("alpha", "0.0", "L2 penalty strength"),
            param("max_iter", "1000", "gradient descent iterations"),
            param("learning_rate", "0.1", "gradient descent step size"),
        ],
    },
    AlgorithmInfo {
        name: "KNN",
        tasks: BOTH,
        description: "k-nearest neighbors",
        params: &[
            param("n_neighbors", "5", "neighbors consulted per prediction"),
            param("weights", "uniform", "uniform or distance"),
            param("metric", "euclidean", "euclidean or manhattan"),
        ],
    },
    AlgorithmInfo {
        name: "DecisionTree",
        tasks: BOTH,
        description: "CART decision tree",
        params: TREE_PARAMS,
    },
    AlgorithmInfo {
        name: "RandomForest",
        tasks: BOTH,
        description: "bagged decision trees",
        params: FOREST_PARAMS,
    },
];

/// Look an algorithm up by name, ignoring case
pub fn find_algorithm(name: &str) -> Option<&'static AlgorithmInfo> {
    CATALOG.iter().find(|info| info.name.eq_ignore_ascii_case(name))
}

/// A model built by [`ModelRegistry`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TrainedModel {
    Linear(LinearRegression),
    Logistic(LogisticRegression),
    Knn(Knn),
    DecisionTree(DecisionTree),
    RandomForest(RandomForest),
}

impl TrainedModel {
    fn estimator(&self) -> &dyn Estimator {
        match self {
            TrainedModel::Linear(m) => m,
            TrainedModel::Logistic(m) => m,
            TrainedModel::Knn(m) => m,
            TrainedModel::DecisionTree(m) => m,
            TrainedModel::RandomForest(m) => m,
        }
    }

    fn estimator_mut(&mut self) -> &mut dyn Estimator {
        match self {
            TrainedModel::Linear(m) => m,
            TrainedModel::Logistic(m) => m,
            TrainedModel::Knn(m) => m,
            TrainedModel::DecisionTree(m) => m,
            TrainedModel::RandomForest(m) => m,
        }
    }
}

impl Estimator for TrainedModel {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        self.estimator_mut().fit(x, y)
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        self.estimator().predict(x)
    }
}

/// Default [`ModelFactory`] covering [`CATALOG`]
#[derive(Debug, Clone, Copy, Default)]
pub struct ModelRegistry;

impl ModelRegistry {
    pub fn new() -> Self {
        Self
    }
}

impl ModelFactory for ModelRegistry {
    type Model = TrainedModel;

    fn create(&self, task: TaskType, algorithm: &str, params: &Params, seed: Option<u64>) -> Result<TrainedModel> {
        let info = find_algorithm(algorithm).ok_or_else(|| {
            PipelineError::Fit(format!(
                "unknown algorithm `{}`; supported: {}",
                algorithm,
                CATALOG.iter().map(|a| a.name).collect::<Vec<_>>().join(", ")
            ))
        })?;
        if !info.supports(task) {
            return Err(PipelineError::Fit(format!(
                "{} does not support {}",
                info.name, task
            )));
        }
        let names = info.param_names();
        let p = ParamReader::new(info.name, params, &names)?;
        let classify = task.is_classification();

        let model = match info.name {
            "LinearRegression" => {
                TrainedModel::Linear(LinearRegression::new().with_fit_intercept(p.bool("fit_intercept", true)?))
            }
            "Ridge" => TrainedModel::Linear(
                LinearRegression::new()
                    .with_alpha(p.positive_f64("alpha", 1.0)?)
                    .with_fit_intercept(p.bool("fit_intercept", true)?),
            ),
            "LogisticRegression" => TrainedModel::Logistic(
                LogisticRegression::new()
                    .with_alpha(p.f64("alpha", 0.0)?)
                    .with_max_iter(p.usize("max_iter", 1000)?)
                    .with_learning_rate(p.positive_f64("learning_rate", 0.1)?),
            ),
            "KNN" => {
                let k = p.usize("n_neighbors", 5)?;
                let knn = if classify { Knn::classifier(k) } else { Knn::regressor(k) };
                let weights = match p.choice("weights", "uniform", &["uniform", "distance"])? {
                    "distance" => WeightScheme::Distance,
                    _ => WeightScheme::Uniform,
                };
                let metric = match p.choice("metric", "euclidean", &["euclidean", "manhattan"])? {
                    "manhattan" => DistanceMetric::Manhattan,
                    _ => DistanceMetric::Euclidean,
                };
                TrainedModel::Knn(knn.with_weights(weights).with_metric(metric))
            }
            "DecisionTree" => TrainedModel::DecisionTree(
                DecisionTree::with_criterion(criterion(&p, classify)?)
                    .with_max_depth(p.opt_usize("max_depth")?)
                    .with_min_samples_split(p.usize("min_samples_split", 2)?)
                    .with_min_samples_leaf(p.usize("min_samples_leaf", 1)?)
                    .with_random_state(random_state(&p, seed)?),
            ),
            "RandomForest" => {
                let forest = if classify {
                    RandomForest::new_classifier(100)
                } else {
                    RandomForest::new_regressor(100)
                };
                TrainedModel::RandomForest(
                    forest
                        .with_criterion(criterion(&p, classify)?)
                        .with_max_depth(p.opt_usize("max_depth")?)
                        .with_min_samples_split(p.usize("min_samples_split", 2)?)
                        .with_min_samples_leaf(p.usize("min_samples_leaf", 1)?)
                        .with_max_features(max_features(&p)?)
                        .with_bootstrap(p.bool("bootstrap", true)?)
                        .with_random_state(random_state(&p, seed)?)
                        .with_n_estimators(p.usize("n_estimators", 100)?),
                )
            }
            other => return Err(PipelineError::Fit(format!("no builder for algorithm `{}`", other))),
        };
        Ok(model)
    }
}

fn criterion(p: &ParamReader<'_>, classify: bool) -> Result<Criterion> {
    if classify {
        Ok(match p.choice("criterion", "gini", &["gini", "entropy"])? {
            "entropy" => Criterion::Entropy,
            _ => Criterion::Gini,
        })
    } else {
        p.choice("criterion", "squared_error", &["squared_error"])?;
        Ok(Criterion::SquaredError)
    }
}

fn random_state(p: &ParamReader<'_>, seed: Option<u64>) -> Result<Option<u64>> {
    Ok(p.opt_usize("random_state")?.map(|s| s as u64).or(seed))
}

fn max_features(p: &ParamReader<'_>) -> Result<MaxFeatures> {
    let invalid = |v: &ParamValue| {
        PipelineError::Fit(format!(
            "parameter `max_features` must be auto, sqrt, log2, all, a positive integer or a fraction in (0, 1], got `{}`",
            v
        ))
    };
    match p.get("max_features") {
        None => Ok(MaxFeatures::Auto),
        Some(ParamValue::Str(s)) => match s.as_str() {
            "auto" => Ok(MaxFeatures::Auto),
            "sqrt" => Ok(MaxFeatures::Sqrt),
            "log2" => Ok(MaxFeatures::Log2),
            "all" => Ok(MaxFeatures::All),
            _ => Err(invalid(&ParamValue::Str(s.clone()))),
        },
        Some(ParamValue::Int(n)) if *n > 0 => Ok(MaxFeatures::Fixed(*n as usize)),
        Some(ParamValue::Float(f)) if *f > 0.0 && *f <= 1.0 => Ok(MaxFeatures::Fraction(*f)),
        Some(other) => Err(invalid(other)),
    }
}
