//! Feature scaling

use crate::descriptor::ScaleMethod;
use crate::error::{PipelineError, Result};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Parameters for one fitted column
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
struct ScalerParams {
    center: f64, // mean or min
    scale: f64,  // std or range
}

/// Column scaler fitted on training rows
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scaler {
    method: ScaleMethod,
    params: BTreeMap<String, ScalerParams>,
}

impl Scaler {
    /// Fit `method` on `columns` of `df`. Columns must be numeric.
    pub fn fit(method: ScaleMethod, df: &DataFrame, columns: &[String]) -> Result<Self> {
        let mut params = BTreeMap::new();
        for name in columns {
            let series = numeric_column(df, name)?;
            let ca = series.f64()?;
            let fitted = match method {
                ScaleMethod::Standard => {
                    let mean = ca.mean().unwrap_or(0.0);
                    let std = ca.std(1).unwrap_or(1.0);
                    ScalerParams {
                        center: mean,
                        scale: if std == 0.0 || std.is_nan() { 1.0 } else { std },
                    }
                }
                ScaleMethod::MinMax => {
                    let min = ca.min().unwrap_or(0.0);
                    let max = ca.max().unwrap_or(1.0);
                    let range = max - min;
                    ScalerParams {
                        center: min,
                        scale: if range == 0.0 { 1.0 } else { range },
                    }
                }
            };
            params.insert(name.clone(), fitted);
        }
        Ok(Self { method, params })
    }

    pub fn method(&self) -> ScaleMethod {
        self.method
    }

    /// Columns this scaler was fitted on
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.params.keys().map(String::as_str)
    }

    /// Scale every fitted column present in `df`; absent columns are skipped
    pub fn transform(&self, df: &DataFrame) -> Result<DataFrame> {
        self.apply(df, |v, p| (v - p.center) / p.scale)
    }

    /// Undo the scaling of every fitted column present in `df`
    pub fn inverse_transform(&self, df: &DataFrame) -> Result<DataFrame> {
        self.apply(df, |v, p| v * p.scale + p.center)
    }

    // Builds all replacement columns first, then swaps them in on one clone
    fn apply(&self, df: &DataFrame, f: impl Fn(f64, &ScalerParams) -> f64) -> Result<DataFrame> {
        let replacements = self
            .params
            .iter()
            .filter(|(name, _)| df.column(name).is_ok())
            .map(|(name, params)| {
                let series = numeric_column(df, name)?;
                let scaled: Float64Chunked = series
                    .f64()?
                    .into_iter()
                    .map(|opt| opt.map(|v| f(v, params)))
                    .collect();
                Ok(scaled.with_name(series.name().clone()).into_series())
            })
            .collect::<Result<Vec<_>>>()?;

        let mut result = df.clone();
        for series in replacements {
            result.with_column(series)?;
        }
        Ok(result)
    }
}

/// Column cast to Float64; string columns are rejected
pub(crate) fn numeric_column(df: &DataFrame, name: &str) -> Result<Series> {
    let column = df
        .column(name)
        .map_err(|_| PipelineError::Dataset(format!("column `{}` not found", name)))?;
    if !column.dtype().is_primitive_numeric() && column.dtype() != &DataType::Boolean {
        return Err(PipelineError::Dataset(format!(
            "column `{}` has type {} and cannot be used as a number; add an `encoding` step",
            name,
            column.dtype()
        )));
    }
    Ok(column
        .as_materialized_series()
        .cast(&DataType::Float64)?)
}
