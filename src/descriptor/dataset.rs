//! Dataset section of the pipeline descriptor

use super::preprocess::PreprocessStep;
use serde::{Deserialize, Serialize};

/// On-disk format of the dataset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatasetFormat {
    #[default]
    Csv,
    Json,
    Parquet,
}

/// Reader options, only meaningful for delimited text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadOptions {
    /// Field separator
    #[serde(rename = "sep")]
    pub separator: char,
    /// Whether the first row holds column names
    pub has_header: bool,
    /// Rows to skip before the header
    pub skip_rows: usize,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            separator: ',',
            has_header: true,
            skip_rows: 0,
        }
    }
}

/// Train/test split options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitSpec {
    /// Fraction of rows held out for testing, strictly between 0 and 1
    pub test_size: f64,
    /// Permute rows before splitting
    pub shuffle: bool,
    /// Keep class proportions in both splits (classification only)
    #[serde(default)]
    pub stratify: bool,
}

impl Default for SplitSpec {
    fn default() -> Self {
        Self {
            test_size: 0.2,
            shuffle: true,
            stratify: false,
        }
    }
}

impl SplitSpec {
    pub fn new(test_size: f64, shuffle: bool) -> Self {
        Self {
            test_size,
            shuffle,
            stratify: false,
        }
    }

    /// Number of test rows for a dataset of `n_rows` rows
    pub fn n_test(&self, n_rows: usize) -> usize {
        // 0.3 * 10 is 3.0000000000000004 in binary floating point
        let exact = n_rows as f64 * self.test_size;
        (exact - 1e-9).ceil().max(0.0) as usize
    }
}

/// Everything about where the data comes from and how it is prepared
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DatasetSpec {
    #[serde(rename = "type")]
    pub format: DatasetFormat,
    #[serde(rename = "read_data_options", default)]
    pub read_options: ReadOptions,
    #[serde(default)]
    pub split: SplitSpec,
    /// Steps applied in declared order
    #[serde(default)]
    pub preprocess: Vec<PreprocessStep>,
}

impl DatasetSpec {
    pub fn with_split(mut self, split: SplitSpec) -> Self {
        self.split = split;
        self
    }

    pub fn with_step(mut self, step: PreprocessStep) -> Self {
        self.preprocess.push(step);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_n_test_rounds_up() {
        let split = SplitSpec::new(0.2, false);
        assert_eq!(split.n_test(10), 2);
        assert_eq!(split.n_test(11), 3);
        assert_eq!(split.n_test(5), 1);
        assert_eq!(SplitSpec::new(0.3, false).n_test(10), 3);
    }

    #[test]
    fn test_defaults() {
        let spec = DatasetSpec::default();
        assert_eq!(spec.format, DatasetFormat::Csv);
        assert_eq!(spec.split.test_size, 0.2);
        assert!(spec.split.shuffle);
        assert!(spec.preprocess.is_empty());
        assert_eq!(spec.read_options.separator, ',');
    }
}
