//! Preprocessing steps
//!
//! Each step is a tagged variant; the document spells a step as a single-key
//! mapping (`scale: {method: standard, target: inputs}`), which is also how
//! steps serialize.

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

/// How missing values are handled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImputeStrategy {
    /// Drop rows containing a missing value
    Drop,
    Mean,
    Median,
    MostFrequent,
}

/// Categorical encoding of string input columns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EncodingMethod {
    #[serde(rename = "oneHotEncoding", alias = "one_hot")]
    OneHot,
    #[serde(rename = "labelEncoding", alias = "label")]
    Label,
}

/// Feature scaling method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScaleMethod {
    /// z-score: (x - mean) / std
    Standard,
    /// (x - min) / (max - min)
    MinMax,
}

/// Which columns a step applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScaleTarget {
    /// Feature columns
    #[default]
    Inputs,
    /// Target columns
    Outputs,
    /// Feature and target columns
    All,
}

impl ScaleTarget {
    pub fn includes_inputs(self) -> bool {
        matches!(self, ScaleTarget::Inputs | ScaleTarget::All)
    }

    pub fn includes_outputs(self) -> bool {
        matches!(self, ScaleTarget::Outputs | ScaleTarget::All)
    }
}

/// A single preprocessing step
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PreprocessStep {
    MissingValues(ImputeStrategy),
    Encoding {
        #[serde(rename = "type")]
        method: EncodingMethod,
    },
    Scale {
        method: ScaleMethod,
        #[serde(default)]
        target: ScaleTarget,
    },
}

impl PreprocessStep {
    /// Key the step is spelled with in a document
    pub fn key(&self) -> &'static str {
        match self {
            PreprocessStep::MissingValues(_) => "missing_values",
            PreprocessStep::Encoding { .. } => "encoding",
            PreprocessStep::Scale { .. } => "scale",
        }
    }

    pub fn scale(method: ScaleMethod, target: ScaleTarget) -> Self {
        PreprocessStep::Scale { method, target }
    }
}

#[derive(Serialize)]
struct EncodingBody {
    #[serde(rename = "type")]
    method: EncodingMethod,
}

#[derive(Serialize)]
struct ScaleBody {
    method: ScaleMethod,
    target: ScaleTarget,
}

// serde_yaml writes derived enum variants as YAML tags; steps must stay plain
// single-key mappings so a serialized descriptor reloads through the loader.
impl Serialize for PreprocessStep {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        match self {
            PreprocessStep::MissingValues(strategy) => map.serialize_entry(self.key(), strategy)?,
            PreprocessStep::Encoding { method } => {
                map.serialize_entry(self.key(), &EncodingBody { method: *method })?
            }
            PreprocessStep::Scale { method, target } => map.serialize_entry(
                self.key(),
                &ScaleBody {
                    method: *method,
                    target: *target,
                },
            )?,
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_serializes_as_single_key_map() {
        let step = PreprocessStep::scale(ScaleMethod::MinMax, ScaleTarget::All);
        let json = serde_json::to_string(&step).unwrap();
        assert_eq!(json, r#"{"scale":{"method":"minmax","target":"all"}}"#);

        let back: PreprocessStep = serde_json::from_str(&json).unwrap();
        assert_eq!(back, step);
    }

    #[test]
    fn test_encoding_names() {
        let step = PreprocessStep::Encoding { method: EncodingMethod::OneHot };
        let json = serde_json::to_string(&step).unwrap();
        assert_eq!(json, r#"{"encoding":{"type":"oneHotEncoding"}}"#);

        let yaml = serde_yaml::to_string(&PreprocessStep::MissingValues(ImputeStrategy::MostFrequent)).unwrap();
        assert_eq!(yaml.trim(), "missing_values: most_frequent");
    }

    #[test]
    fn test_scale_target_scope() {
        assert!(ScaleTarget::Inputs.includes_inputs());
        assert!(!ScaleTarget::Inputs.includes_outputs());
        assert!(ScaleTarget::All.includes_inputs() && ScaleTarget::All.includes_outputs());
    }
}
