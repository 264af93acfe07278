//! Pipeline dispatch
//!
//! [`PipelineDispatcher`] interprets a validated [`PipelineDescriptor`] and
//! drives the collaborators in a fixed order:
//!
//! 1. `load`: read the dataset
//! 2. `split`: train/test partition
//! 3. `preprocess`: fit steps on the training rows, apply to both
//! 4. `build_model`: one estimator per target column
//! 5. `search` when a search is configured, otherwise `fit`
//! 6. `evaluate`: metrics on the test rows
//!
//! A failure aborts the run and is reported with the stage it happened in.
//!
//! [`PipelineDescriptor`]: crate::descriptor::PipelineDescriptor

mod artifact;
mod dispatcher;

pub use artifact::{EvaluationReport, FittedPipeline, FittedTarget, TargetMetrics};
pub use dispatcher::{PipelineDispatcher, PipelineRun, StageTiming};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Dispatcher stages, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Load,
    Split,
    Preprocess,
    BuildModel,
    Search,
    Fit,
    Evaluate,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Load => "load",
            Stage::Split => "split",
            Stage::Preprocess => "preprocess",
            Stage::BuildModel => "build_model",
            Stage::Search => "search",
            Stage::Fit => "fit",
            Stage::Evaluate => "evaluate",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Runtime options that are not part of the pipeline document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunOptions {
    /// Seed for shuffling, candidate sampling and model randomness.
    /// Runs without a seed draw from entropy.
    pub seed: Option<u64>,
}

impl RunOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_names() {
        assert_eq!(Stage::BuildModel.to_string(), "build_model");
        assert_eq!(serde_json::to_string(&Stage::Evaluate).unwrap(), "\"evaluate\"");
    }

    #[test]
    fn test_run_options() {
        assert_eq!(RunOptions::default().seed, None);
        assert_eq!(RunOptions::new().with_seed(3).seed, Some(3));
    }
}
