//! Preprocessing collaborator
//!
//! Steps run in declared order. Each one is fitted on the training rows, the
//! training frame is transformed before the next step is fitted, and the
//! resulting chain is replayed on any other frame (test split, new data).
//! - Missing value handling (drop, mean, median, most frequent)
//! - Categorical encoding (one-hot, label)
//! - Feature scaling (standard, min-max) of inputs, outputs or both

mod encoder;
mod imputer;
mod scaler;

pub use encoder::{Encoder, LabelMap};
pub use imputer::{FillValue, Imputer};
pub use scaler::Scaler;

pub(crate) use scaler::numeric_column;

use crate::descriptor::{ImputeStrategy, PreprocessStep};
use crate::error::Result;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// A preprocessing step after fitting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum FittedStep {
    Impute(Imputer),
    Encode(Encoder),
    Scale(Scaler),
}

impl FittedStep {
    pub fn transform(&self, df: &DataFrame) -> Result<DataFrame> {
        match self {
            FittedStep::Impute(imputer) => imputer.transform(df),
            FittedStep::Encode(encoder) => encoder.transform(df),
            FittedStep::Scale(scaler) => scaler.transform(df),
        }
    }
}

/// Fitted preprocessing chain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preprocessor {
    steps: Vec<FittedStep>,
    /// Feature columns after every step has run
    inputs: Vec<String>,
    outputs: Vec<String>,
}

impl Preprocessor {
    /// Fit `steps` on `train`; returns the chain and the transformed frame
    pub fn fit(
        steps: &[PreprocessStep],
        train: &DataFrame,
        inputs: &[String],
        outputs: &[String],
    ) -> Result<(Self, DataFrame)> {
        let mut df = train.clone();
        let mut current = inputs.to_vec();
        let mut fitted = Vec::with_capacity(steps.len());

        for step in steps {
            let step_fitted = match step {
                PreprocessStep::MissingValues(strategy) => {
                    // rows with a missing target are dropped too; fills only touch inputs
                    let mut columns = current.clone();
                    if *strategy == ImputeStrategy::Drop {
                        columns.extend_from_slice(outputs);
                    }
                    FittedStep::Impute(Imputer::fit(*strategy, &df, &columns)?)
                }
                PreprocessStep::Encoding { method } => {
                    let encoder = Encoder::fit(*method, &df, &current)?;
                    current = encoder.output_columns(&current);
                    FittedStep::Encode(encoder)
                }
                PreprocessStep::Scale { method, target } => {
                    let mut columns = Vec::new();
                    if target.includes_inputs() {
                        columns.extend_from_slice(&current);
                    }
                    if target.includes_outputs() {
                        columns.extend_from_slice(outputs);
                    }
                    FittedStep::Scale(Scaler::fit(*method, &df, &columns)?)
                }
            };
            df = step_fitted.transform(&df)?;
            debug!(step = step.key(), rows = df.height(), cols = df.width(), "Preprocessing step fitted");
            fitted.push(step_fitted);
        }

        let preprocessor = Self {
            steps: fitted,
            inputs: current,
            outputs: outputs.to_vec(),
        };
        Ok((preprocessor, df))
    }

    /// Replay the fitted chain on another frame. Target columns may be absent.
    pub fn transform(&self, df: &DataFrame) -> Result<DataFrame> {
        let mut out = df.clone();
        for step in &self.steps {
            out = step.transform(&out)?;
        }
        Ok(out)
    }

    /// Map scaled target values back to their original units
    pub fn inverse_transform_outputs(&self, predictions: &DataFrame) -> Result<DataFrame> {
        let mut out = predictions.clone();
        for step in self.steps.iter().rev() {
            if let FittedStep::Scale(scaler) = step {
                if scaler.columns().any(|c| self.outputs.iter().any(|o| o == c)) {
                    out = scaler.inverse_transform(&out)?;
                }
            }
        }
        Ok(out)
    }

    /// Feature columns the estimator sees, in order
    pub fn input_columns(&self) -> &[String] {
        &self.inputs
    }

    pub fn steps(&self) -> &[FittedStep] {
        &self.steps
    }

    /// True when any step scales a target column
    pub fn scales_outputs(&self) -> bool {
        self.steps.iter().any(|step| match step {
            FittedStep::Scale(scaler) => scaler.columns().any(|c| self.outputs.iter().any(|o| o == c)),
            _ => false,
        })
    }
}
