//! Error types for the pipeline driver

use crate::pipeline::Stage;
use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Main error type for the pipeline driver
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Missing or malformed configuration key, or an unknown enum value
    #[error("Configuration error at `{key}`: {reason}")]
    Config { key: String, reason: String },

    /// Dataset load, split or preprocessing failure
    #[error("Dataset error: {0}")]
    Dataset(String),

    /// Model construction, training or search failure
    #[error("Fit error: {0}")]
    Fit(String),

    /// A dispatcher stage failed; wraps the underlying error
    #[error("Stage `{stage}` failed: {source}")]
    Stage {
        stage: Stage,
        #[source]
        source: Box<PipelineError>,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Model not fitted")]
    ModelNotFitted,
}

impl PipelineError {
    /// Configuration error for a dotted key path
    pub fn config(key: impl Into<String>, reason: impl Into<String>) -> Self {
        PipelineError::Config {
            key: key.into(),
            reason: reason.into(),
        }
    }

    /// Tag this error with the stage it happened in.
    /// Errors that already carry a stage are left alone.
    pub fn in_stage(self, stage: Stage) -> Self {
        match self {
            PipelineError::Stage { .. } => self,
            other => PipelineError::Stage {
                stage,
                source: Box::new(other),
            },
        }
    }

    /// Stage the error was raised in, if it went through the dispatcher
    pub fn stage(&self) -> Option<Stage> {
        match self {
            PipelineError::Stage { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    /// The innermost error, with any stage wrapper removed
    pub fn root(&self) -> &PipelineError {
        match self {
            PipelineError::Stage { source, .. } => source.root(),
            other => other,
        }
    }

    pub fn is_config(&self) -> bool {
        matches!(self.root(), PipelineError::Config { .. })
    }

    pub fn is_dataset(&self) -> bool {
        matches!(self.root(), PipelineError::Dataset(_))
    }

    pub fn is_fit(&self) -> bool {
        matches!(self.root(), PipelineError::Fit(_))
    }
}

impl From<polars::error::PolarsError> for PipelineError {
    fn from(err: polars::error::PolarsError) -> Self {
        PipelineError::Dataset(err.to_string())
    }
}

impl From<serde_json::Error> for PipelineError {
    fn from(err: serde_json::Error) -> Self {
        PipelineError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for PipelineError {
    fn from(err: serde_yaml::Error) -> Self {
        PipelineError::Serialization(err.to_string())
    }
}

impl From<ndarray::ShapeError> for PipelineError {
    fn from(err: ndarray::ShapeError) -> Self {
        PipelineError::Fit(format!("invalid shape: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PipelineError::config("dataset.split.test_size", "must be in (0, 1)");
        assert_eq!(
            err.to_string(),
            "Configuration error at `dataset.split.test_size`: must be in (0, 1)"
        );
    }

    #[test]
    fn test_stage_wrapping() {
        let err = PipelineError::Dataset("no rows".to_string()).in_stage(Stage::Split);
        assert_eq!(err.stage(), Some(Stage::Split));
        assert!(err.is_dataset());
        assert_eq!(err.to_string(), "Stage `split` failed: Dataset error: no rows");

        // re-tagging keeps the original stage
        let err = err.in_stage(Stage::Fit);
        assert_eq!(err.stage(), Some(Stage::Split));
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: PipelineError = io_err.into();
        assert!(matches!(err, PipelineError::Io(_)));
    }
}
