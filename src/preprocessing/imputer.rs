//! Missing value handling

use super::scaler::numeric_column;
use crate::descriptor::ImputeStrategy;
use crate::error::{PipelineError, Result};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::warn;

/// Value substituted for nulls in one column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FillValue {
    Number(f64),
    Text(String),
}

/// Imputer fitted on training rows
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Imputer {
    strategy: ImputeStrategy,
    /// Columns checked for nulls
    columns: Vec<String>,
    /// Fill values; empty for `drop`
    fill: BTreeMap<String, FillValue>,
}

impl Imputer {
    pub fn fit(strategy: ImputeStrategy, df: &DataFrame, columns: &[String]) -> Result<Self> {
        let mut fill = BTreeMap::new();
        for name in columns {
            let is_text = df
                .column(name)
                .map(|c| c.dtype() == &DataType::String)
                .unwrap_or(false);
            let value = match strategy {
                ImputeStrategy::Drop => continue,
                // averages are undefined for text; fall back to the mode
                ImputeStrategy::Mean | ImputeStrategy::Median if is_text => most_frequent(df, name)?,
                ImputeStrategy::Mean => {
                    FillValue::Number(numeric_column(df, name)?.f64()?.mean().unwrap_or(0.0))
                }
                ImputeStrategy::Median => {
                    FillValue::Number(numeric_column(df, name)?.f64()?.median().unwrap_or(0.0))
                }
                ImputeStrategy::MostFrequent => most_frequent(df, name)?,
            };
            fill.insert(name.clone(), value);
        }
        Ok(Self {
            strategy,
            columns: columns.to_vec(),
            fill,
        })
    }

    pub fn strategy(&self) -> ImputeStrategy {
        self.strategy
    }

    /// Fill (or drop) nulls in the fitted columns present in `df`
    pub fn transform(&self, df: &DataFrame) -> Result<DataFrame> {
        if self.strategy == ImputeStrategy::Drop {
            return self.drop_rows(df);
        }

        let mut result = df.clone();
        for (name, value) in &self.fill {
            let Ok(column) = df.column(name) else {
                continue;
            };
            if column.null_count() == 0 {
                continue;
            }
            let series = column.as_materialized_series();
            let filled = match value {
                FillValue::Number(v) => {
                    let numeric = numeric_column(df, name)?;
                    let ca: Float64Chunked = numeric
                        .f64()?
                        .into_iter()
                        .map(|opt| Some(opt.unwrap_or(*v)))
                        .collect();
                    ca.with_name(series.name().clone()).into_series()
                }
                FillValue::Text(v) => {
                    let ca: StringChunked = series
                        .cast(&DataType::String)?
                        .str()?
                        .into_iter()
                        .map(|opt| Some(opt.unwrap_or(v.as_str()).to_string()))
                        .collect();
                    ca.with_name(series.name().clone()).into_series()
                }
            };
            result.with_column(filled)?;
        }
        Ok(result)
    }

    fn drop_rows(&self, df: &DataFrame) -> Result<DataFrame> {
        let mut mask = BooleanChunked::full("mask".into(), true, df.height());
        for name in &self.columns {
            if let Ok(column) = df.column(name) {
                let present = column.as_materialized_series().is_not_null();
                mask = &mask & &present;
            }
        }
        let kept = df.filter(&mask)?;
        let dropped = df.height() - kept.height();
        if dropped > 0 {
            warn!(dropped, remaining = kept.height(), "Dropped rows with missing values");
        }
        if kept.height() == 0 {
            return Err(PipelineError::Dataset(
                "every row contains a missing value".to_string(),
            ));
        }
        Ok(kept)
    }
}

fn most_frequent(df: &DataFrame, name: &str) -> Result<FillValue> {
    let column = df
        .column(name)
        .map_err(|_| PipelineError::Dataset(format!("column `{}` not found", name)))?;

    if column.dtype() == &DataType::String {
        let mut counts: HashMap<&str, usize> = HashMap::new();
        let ca = column.as_materialized_series().str()?;
        for value in ca.into_iter().flatten() {
            *counts.entry(value).or_default() += 1;
        }
        // ties resolve to the smallest value so the fit is deterministic
        let best = counts
            .into_iter()
            .max_by(|a, b| a.1.cmp(&b.1).then_with(|| b.0.cmp(&a.0)))
            .map(|(v, _)| v.to_string())
            .unwrap_or_default();
        return Ok(FillValue::Text(best));
    }

    let series = numeric_column(df, name)?;
    let mut counts: HashMap<u64, usize> = HashMap::new();
    for value in series.f64()?.into_iter().flatten() {
        *counts.entry(value.to_bits()).or_default() += 1;
    }
    let best = counts
        .into_iter()
        .max_by(|a, b| {
            a.1.cmp(&b.1)
                .then_with(|| f64::from_bits(b.0).total_cmp(&f64::from_bits(a.0)))
        })
        .map(|(bits, _)| f64::from_bits(bits))
        .unwrap_or(0.0);
    Ok(FillValue::Number(best))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn columns(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_mean_fill() {
        let df = df!("a" => &[Some(1.0), None, Some(3.0)]).unwrap();
        let imputer = Imputer::fit(ImputeStrategy::Mean, &df, &columns(&["a"])).unwrap();
        let out = imputer.transform(&df).unwrap();
        let values: Vec<f64> = out.column("a").unwrap().f64().unwrap().into_no_null_iter().collect();
        assert_eq!(values, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_median_fill_uses_training_statistic() {
        let train = df!("a" => &[Some(1.0), Some(2.0), Some(10.0)]).unwrap();
        let test = df!("a" => &[None::<f64>, Some(5.0)]).unwrap();
        let imputer = Imputer::fit(ImputeStrategy::Median, &train, &columns(&["a"])).unwrap();
        let out = imputer.transform(&test).unwrap();
        assert_eq!(out.column("a").unwrap().f64().unwrap().get(0), Some(2.0));
    }

    #[test]
    fn test_most_frequent_strings() {
        let df = df!("c" => &[Some("x"), Some("y"), Some("y"), None]).unwrap();
        let imputer = Imputer::fit(ImputeStrategy::MostFrequent, &df, &columns(&["c"])).unwrap();
        let out = imputer.transform(&df).unwrap();
        assert_eq!(out.column("c").unwrap().str().unwrap().get(3), Some("y"));
    }

    #[test]
    fn test_drop_rows() {
        let df = df!(
            "a" => &[Some(1.0), None, Some(3.0)],
            "b" => &[Some(1.0), Some(2.0), None]
        )
        .unwrap();
        let imputer = Imputer::fit(ImputeStrategy::Drop, &df, &columns(&["a"])).unwrap();
        let out = imputer.transform(&df).unwrap();
        assert_eq!(out.height(), 2);
    }

    #[test]
    fn test_mean_on_strings_uses_mode() {
        let df = df!("c" => &[Some("x"), Some("x"), None]).unwrap();
        let imputer = Imputer::fit(ImputeStrategy::Mean, &df, &columns(&["c"])).unwrap();
        let out = imputer.transform(&df).unwrap();
        assert_eq!(out.column("c").unwrap().str().unwrap().get(2), Some("x"));
    }
}
