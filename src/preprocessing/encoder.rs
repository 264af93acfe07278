//! Categorical encoding

use crate::descriptor::EncodingMethod;
use crate::error::{PipelineError, Result};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Encoder for the string columns among a set of input columns
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Encoder {
    method: EncodingMethod,
    /// Column name -> sorted categories seen during fit
    categories: BTreeMap<String, Vec<String>>,
}

impl Encoder {
    /// Fit on every string column in `columns`; numeric columns pass through
    pub fn fit(method: EncodingMethod, df: &DataFrame, columns: &[String]) -> Result<Self> {
        let mut categories = BTreeMap::new();
        for name in columns {
            let column = df
                .column(name)
                .map_err(|_| PipelineError::Dataset(format!("column `{}` not found", name)))?;
            if column.dtype() != &DataType::String {
                continue;
            }
            let seen: BTreeSet<String> = column
                .as_materialized_series()
                .str()?
                .into_iter()
                .flatten()
                .map(str::to_string)
                .collect();
            categories.insert(name.clone(), seen.into_iter().collect());
        }
        Ok(Self { method, categories })
    }

    pub fn method(&self) -> EncodingMethod {
        self.method
    }

    /// Input column list after encoding. One-hot replaces a column by one
    /// column per category, in place.
    pub fn output_columns(&self, inputs: &[String]) -> Vec<String> {
        let mut out = Vec::with_capacity(inputs.len());
        for name in inputs {
            match (self.method, self.categories.get(name)) {
                (EncodingMethod::OneHot, Some(cats)) => {
                    out.extend(cats.iter().map(|cat| one_hot_name(name, cat)))
                }
                _ => out.push(name.clone()),
            }
        }
        out
    }

    pub fn transform(&self, df: &DataFrame) -> Result<DataFrame> {
        let mut result = df.clone();
        for (name, cats) in &self.categories {
            let Ok(column) = df.column(name) else {
                continue;
            };
            let series = column.as_materialized_series().cast(&DataType::String)?;
            let values = series.str()?;

            match self.method {
                EncodingMethod::OneHot => {
                    // unseen categories and nulls encode as all zeros
                    result = result.drop(name)?;
                    for cat in cats {
                        let indicator: Vec<f64> = values
                            .into_iter()
                            .map(|v| if v == Some(cat.as_str()) { 1.0 } else { 0.0 })
                            .collect();
                        result.with_column(Series::new(one_hot_name(name, cat).into(), indicator))?;
                    }
                }
                EncodingMethod::Label => {
                    let codes = values
                        .into_iter()
                        .map(|v| match v {
                            Some(v) => cats
                                .binary_search_by(|c| c.as_str().cmp(v))
                                .map(|i| i as f64)
                                .map_err(|_| {
                                    PipelineError::Dataset(format!(
                                        "column `{}` has category `{}` not seen during training",
                                        name, v
                                    ))
                                }),
                            None => Err(PipelineError::Dataset(format!(
                                "column `{}` contains missing values; add a `missing_values` step",
                                name
                            ))),
                        })
                        .collect::<Result<Vec<f64>>>()?;
                    result.with_column(Series::new(name.as_str().into(), codes))?;
                }
            }
        }
        Ok(result)
    }
}

fn one_hot_name(column: &str, category: &str) -> String {
    format!("{}_{}", column, category)
}

/// Mapping between string class labels and the numeric codes estimators see
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelMap {
    classes: Vec<String>,
}

impl LabelMap {
    /// Collect the distinct labels of a column, sorted
    pub fn fit(series: &Series) -> Result<Self> {
        let labels = series.cast(&DataType::String)?;
        let classes: BTreeSet<String> = labels
            .str()?
            .into_iter()
            .flatten()
            .map(str::to_string)
            .collect();
        Ok(Self {
            classes: classes.into_iter().collect(),
        })
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn encode(&self, series: &Series) -> Result<Vec<f64>> {
        let labels = series.cast(&DataType::String)?;
        labels
            .str()?
            .into_iter()
            .map(|v| {
                let v = v.ok_or_else(|| {
                    PipelineError::Dataset(format!("target `{}` contains missing values", series.name()))
                })?;
                self.classes
                    .binary_search_by(|c| c.as_str().cmp(v))
                    .map(|i| i as f64)
                    .map_err(|_| {
                        PipelineError::Dataset(format!(
                            "target `{}` has label `{}` not seen during training",
                            series.name(),
                            v
                        ))
                    })
            })
            .collect()
    }

    /// Class labels for predicted codes
    pub fn decode(&self, name: &str, codes: &[f64]) -> Series {
        let last = self.classes.len().saturating_sub(1);
        let labels: Vec<&str> = codes
            .iter()
            .map(|&c| {
                let idx = (c.round().max(0.0) as usize).min(last);
                self.classes.get(idx).map(String::as_str).unwrap_or("")
            })
            .collect();
        Series::new(name.into(), labels)
    }
}
