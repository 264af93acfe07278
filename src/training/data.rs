//! DataFrame to ndarray conversion

use crate::error::{PipelineError, Result};
use crate::preprocessing::numeric_column;
use ndarray::{Array1, Array2};
use polars::prelude::*;

/// Numeric values of one column; nulls are an error
pub fn column_to_array1(df: &DataFrame, name: &str) -> Result<Array1<f64>> {
    let series = numeric_column(df, name)?;
    let values = series
        .f64()?
        .into_iter()
        .map(|v| {
            v.ok_or_else(|| {
                PipelineError::Dataset(format!(
                    "column `{}` contains missing values; add a `missing_values` step",
                    name
                ))
            })
        })
        .collect::<Result<Vec<f64>>>()?;
    Ok(Array1::from_vec(values))
}

/// Row-major feature matrix built from `columns`, in order
pub fn columns_to_array2(df: &DataFrame, columns: &[String]) -> Result<Array2<f64>> {
    let col_data = columns
        .iter()
        .map(|name| column_to_array1(df, name))
        .collect::<Result<Vec<_>>>()?;

    Ok(Array2::from_shape_fn((df.height(), columns.len()), |(r, c)| col_data[c][r]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_columns_to_array2() {
        let df = df!("a" => &[1.0, 2.0], "b" => &[3i32, 4], "c" => &[true, false]).unwrap();
        let columns: Vec<String> = vec!["b".into(), "a".into(), "c".into()];
        let x = columns_to_array2(&df, &columns).unwrap();
        assert_eq!(x, ndarray::array![[3.0, 1.0, 1.0], [4.0, 2.0, 0.0]]);
    }

    #[test]
    fn test_nulls_rejected() {
        let df = df!("a" => &[Some(1.0), None]).unwrap();
        let err = column_to_array1(&df, "a").unwrap_err();
        assert!(err.to_string().contains("missing_values"));
    }
}
