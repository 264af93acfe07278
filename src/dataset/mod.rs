//! Dataset collaborators: reading and splitting
//!
//! The dispatcher only sees the [`DatasetReader`] trait. [`PolarsReader`] is
//! the default implementation and reads csv, json and parquet files.

mod split;

pub use split::{train_test_split, TrainTestSplit};

use crate::descriptor::{DatasetFormat, DatasetSpec};
use crate::error::{PipelineError, Result};
use polars::prelude::*;
use std::fs::File;
use std::path::Path;
use std::time::Instant;
use tracing::debug;

/// Loads a dataset described by a [`DatasetSpec`]
pub trait DatasetReader {
    fn read(&self, path: &Path, spec: &DatasetSpec) -> Result<DataFrame>;
}

/// Default reader backed by polars
#[derive(Debug, Clone)]
pub struct PolarsReader {
    infer_schema_length: Option<usize>,
}

impl Default for PolarsReader {
    fn default() -> Self {
        Self::new()
    }
}

impl PolarsReader {
    pub fn new() -> Self {
        Self {
            infer_schema_length: Some(1000),
        }
    }

    /// Rows inspected when inferring csv column types (`None` = all rows)
    pub fn with_infer_schema_length(mut self, rows: Option<usize>) -> Self {
        self.infer_schema_length = rows;
        self
    }

    fn read_csv(&self, path: &Path, spec: &DatasetSpec) -> Result<DataFrame> {
        let options = &spec.read_options;
        let parse_options = CsvParseOptions::default().with_separator(options.separator as u8);

        CsvReadOptions::default()
            .with_has_header(options.has_header)
            .with_skip_rows(options.skip_rows)
            .with_infer_schema_length(self.infer_schema_length)
            .with_parse_options(parse_options)
            .try_into_reader_with_file_path(Some(path.to_path_buf()))
            .and_then(|reader| reader.finish())
            .map_err(|e| PipelineError::Dataset(format!("{}: {}", path.display(), e)))
    }

    fn open(path: &Path) -> Result<File> {
        File::open(path).map_err(|e| PipelineError::Dataset(format!("{}: {}", path.display(), e)))
    }
}

impl DatasetReader for PolarsReader {
    fn read(&self, path: &Path, spec: &DatasetSpec) -> Result<DataFrame> {
        let start = Instant::now();
        let df = match spec.format {
            DatasetFormat::Csv => self.read_csv(path, spec)?,
            DatasetFormat::Json => JsonReader::new(Self::open(path)?)
                .finish()
                .map_err(|e| PipelineError::Dataset(format!("{}: {}", path.display(), e)))?,
            DatasetFormat::Parquet => ParquetReader::new(Self::open(path)?)
                .finish()
                .map_err(|e| PipelineError::Dataset(format!("{}: {}", path.display(), e)))?,
        };

        if df.height() == 0 {
            return Err(PipelineError::Dataset(format!("{} contains no rows", path.display())));
        }

        debug!(
            path = %path.display(),
            rows = df.height(),
            cols = df.width(),
            elapsed = ?start.elapsed(),
            "Dataset loaded"
        );
        Ok(df)
    }
}

/// Check that every column in `columns` exists in `df`
pub fn require_columns(df: &DataFrame, columns: &[String]) -> Result<()> {
    for column in columns {
        if df.column(column).is_err() {
            return Err(PipelineError::Dataset(format!(
                "column `{}` not found; available columns: {}",
                column,
                column_names(df).join(", ")
            )));
        }
    }
    Ok(())
}

/// Column names as owned strings
pub fn column_names(df: &DataFrame) -> Vec<String> {
    df.get_column_names().into_iter().map(|s| s.to_string()).collect()
}
