//! Model section of the pipeline descriptor

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Kind of learning problem
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskType {
    Classification,
    Regression,
}

impl TaskType {
    pub fn is_classification(self) -> bool {
        matches!(self, TaskType::Classification)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TaskType::Classification => "classification",
            TaskType::Regression => "regression",
        }
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A scalar hyperparameter value as written in the document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl ParamValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ParamValue::Int(v) => Some(*v as f64),
            ParamValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_usize(&self) -> Option<usize> {
        match self {
            ParamValue::Int(v) if *v >= 0 => Some(*v as usize),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ParamValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParamValue::Str(v) => Some(v),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, ParamValue::Null)
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Null => f.write_str("null"),
            ParamValue::Bool(v) => write!(f, "{}", v),
            ParamValue::Int(v) => write!(f, "{}", v),
            ParamValue::Float(v) => write!(f, "{}", v),
            ParamValue::Str(v) => f.write_str(v),
        }
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        ParamValue::Int(v)
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        ParamValue::Float(v)
    }
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        ParamValue::Bool(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        ParamValue::Str(v.to_string())
    }
}

/// Named hyperparameters; sorted by name
pub type Params = BTreeMap<String, ParamValue>;

/// Hyperparameter search strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchMethod {
    /// Sample `n_iter` candidates from the grid
    RandomSearch,
    /// Try every combination in the grid
    GridSearch,
}

/// Options passed to the search routine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchArguments {
    /// Cross-validation folds per candidate
    pub cv: usize,
    /// Refit the best candidate on the full training split
    pub refit: bool,
    /// Also report mean training-fold scores
    pub return_train_score: bool,
    /// Verbosity; above zero every candidate is logged at info level
    pub verbose: u32,
    /// Candidates sampled by random search
    pub n_iter: usize,
}

impl Default for SearchArguments {
    fn default() -> Self {
        Self {
            cv: 5,
            refit: true,
            return_train_score: false,
            verbose: 0,
            n_iter: 10,
        }
    }
}

/// Hyperparameter search settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchSpec {
    pub method: SearchMethod,
    /// Candidate values per parameter
    pub parameter_grid: BTreeMap<String, Vec<ParamValue>>,
    #[serde(default)]
    pub arguments: SearchArguments,
}

impl SearchSpec {
    pub fn new(method: SearchMethod) -> Self {
        Self {
            method,
            parameter_grid: BTreeMap::new(),
            arguments: SearchArguments::default(),
        }
    }

    pub fn with_param(mut self, name: impl Into<String>, values: Vec<ParamValue>) -> Self {
        self.parameter_grid.insert(name.into(), values);
        self
    }

    pub fn with_arguments(mut self, arguments: SearchArguments) -> Self {
        self.arguments = arguments;
        self
    }

    /// Number of combinations in the full grid
    pub fn grid_size(&self) -> usize {
        self.parameter_grid.values().map(Vec::len).product()
    }
}

/// Model choice and training options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSpec {
    #[serde(rename = "type")]
    pub task_type: TaskType,
    pub algorithm: String,
    /// Base hyperparameters applied to every fit
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub arguments: Params,
    #[serde(
        rename = "hyperparameter_search",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub search: Option<SearchSpec>,
}

impl ModelSpec {
    pub fn new(task_type: TaskType, algorithm: impl Into<String>) -> Self {
        Self {
            task_type,
            algorithm: algorithm.into(),
            arguments: Params::new(),
            search: None,
        }
    }

    pub fn with_argument(mut self, name: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.arguments.insert(name.into(), value.into());
        self
    }

    pub fn with_search(mut self, search: SearchSpec) -> Self {
        self.search = Some(search);
        self
    }
}
