//! Kolosal Pipeline - configuration-driven machine learning pipelines
//!
//! A pipeline is described by a YAML or JSON document: where the data comes
//! from, how it is split and preprocessed, which algorithm to fit (optionally
//! with a hyperparameter search) and which columns to predict.
//!
//! # Modules
//!
//! ## Description
//! - [`config`] - Load and validate pipeline documents
//! - [`descriptor`] - Typed, immutable pipeline descriptor
//!
//! ## Execution
//! - [`pipeline`] - Stage-by-stage dispatcher and fitted pipeline artifact
//! - [`dataset`] - Dataset reading and train/test splitting
//! - [`preprocessing`] - Imputation, encoding, scaling
//! - [`training`] - Estimators, metrics and cross validation
//! - [`search`] - Grid and random hyperparameter search
//!
//! ## Services
//! - [`cli`] - Command-line interface
//!
//! ```no_run
//! use kolosal_pipeline::prelude::*;
//!
//! let descriptor = load_file("igel.yaml")?;
//! let run = PipelineDispatcher::new().with_seed(42).run(&descriptor, "train.csv")?;
//! run.pipeline.save("model.json")?;
//! # Ok::<(), PipelineError>(())
//! ```

// Core error handling
pub mod error;

// Description
pub mod config;
pub mod descriptor;

// Execution
pub mod dataset;
pub mod pipeline;
pub mod preprocessing;
pub mod search;
pub mod training;

// Services
pub mod cli;

pub use error::{PipelineError, Result};

/// Re-export commonly used types
pub mod prelude {
    // Error handling
    pub use crate::error::{PipelineError, Result};

    // Configuration
    pub use crate::config::{load_file, load_str, to_yaml};
    pub use crate::descriptor::{
        DatasetSpec, ModelSpec, PipelineDescriptor, PreprocessStep, SearchMethod, SearchSpec, SplitSpec,
        TargetSpec, TaskType,
    };

    // Execution
    pub use crate::dataset::{DatasetReader, PolarsReader};
    pub use crate::pipeline::{EvaluationReport, FittedPipeline, PipelineDispatcher, PipelineRun, RunOptions, Stage};
    pub use crate::preprocessing::Preprocessor;
    pub use crate::search::{HyperparameterSearch, SearchReport};
    pub use crate::training::{Estimator, ModelFactory, ModelMetrics, ModelRegistry, TrainedModel};
}
