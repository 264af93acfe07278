//! Typed access to hyperparameters

use crate::descriptor::{ParamValue, Params};
use crate::error::{PipelineError, Result};

/// Reads hyperparameters for one algorithm, rejecting unknown names up front
pub(crate) struct ParamReader<'a> {
    algorithm: &'a str,
    params: &'a Params,
}

impl<'a> ParamReader<'a> {
    pub fn new(algorithm: &'a str, params: &'a Params, allowed: &[&str]) -> Result<Self> {
        if let Some(unknown) = params.keys().find(|k| !allowed.contains(&k.as_str())) {
            return Err(PipelineError::Fit(format!(
                "unknown parameter `{}` for {}; supported: {}",
                unknown,
                algorithm,
                allowed.join(", ")
            )));
        }
        Ok(Self { algorithm, params })
    }

    fn invalid(&self, name: &str, value: &ParamValue, expected: &str) -> PipelineError {
        PipelineError::Fit(format!(
            "parameter `{}` of {} must be {}, got `{}`",
            name, self.algorithm, expected, value
        ))
    }

    /// Raw value; explicit nulls count as absent
    pub fn get(&self, name: &str) -> Option<&'a ParamValue> {
        self.params.get(name).filter(|v| !v.is_null())
    }

    pub fn f64(&self, name: &str, default: f64) -> Result<f64> {
        match self.get(name) {
            None => Ok(default),
            Some(v) => v.as_f64().ok_or_else(|| self.invalid(name, v, "a number")),
        }
    }

    pub fn positive_f64(&self, name: &str, default: f64) -> Result<f64> {
        let value = self.f64(name, default)?;
        if value > 0.0 {
            Ok(value)
        } else {
            Err(PipelineError::Fit(format!(
                "parameter `{}` of {} must be positive, got {}",
                name, self.algorithm, value
            )))
        }
    }

    pub fn usize(&self, name: &str, default: usize) -> Result<usize> {
        match self.get(name) {
            None => Ok(default),
            Some(v) => v.as_usize().ok_or_else(|| self.invalid(name, v, "a non-negative integer")),
        }
    }

    /// Integer parameter where null means "no limit"
    pub fn opt_usize(&self, name: &str) -> Result<Option<usize>> {
        self.get(name)
            .map(|v| v.as_usize().ok_or_else(|| self.invalid(name, v, "a non-negative integer or null")))
            .transpose()
    }

    pub fn bool(&self, name: &str, default: bool) -> Result<bool> {
        match self.get(name) {
            None => Ok(default),
            Some(v) => v.as_bool().ok_or_else(|| self.invalid(name, v, "true or false")),
        }
    }

    /// String parameter restricted to `choices`
    pub fn choice(&self, name: &str, default: &'static str, choices: &[&'static str]) -> Result<&'static str> {
        let Some(value) = self.get(name) else {
            return Ok(default);
        };
        value
            .as_str()
            .and_then(|s| choices.iter().copied().find(|c| *c == s))
            .ok_or_else(|| self.invalid(name, value, &format!("one of {}", choices.join(", "))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(entries: &[(&str, ParamValue)]) -> Params {
        entries.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn test_unknown_parameter() {
        let p = params(&[("depth", ParamValue::Int(3))]);
        let err = ParamReader::new("DecisionTree", &p, &["max_depth"]).err().unwrap();
        assert!(err.is_fit());
        assert!(err.to_string().contains("unknown parameter `depth`"));
    }

    #[test]
    fn test_typed_getters() {
        let p = params(&[
            ("alpha", ParamValue::Int(2)),
            ("max_depth", ParamValue::Null),
            ("weights", ParamValue::Str("distance".to_string())),
        ]);
        let reader = ParamReader::new("X", &p, &["alpha", "max_depth", "weights", "k"]).unwrap();
        assert_eq!(reader.f64("alpha", 1.0).unwrap(), 2.0);
        assert_eq!(reader.opt_usize("max_depth").unwrap(), None);
        assert_eq!(reader.usize("k", 5).unwrap(), 5);
        assert_eq!(
            reader.choice("weights", "uniform", &["uniform", "distance"]).unwrap(),
            "distance"
        );
        assert!(reader.usize("alpha", 0).is_ok());
        assert!(reader.bool("alpha", true).is_err());
    }
}
