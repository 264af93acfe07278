//! Configuration tree with path-aware access
//!
//! Every lookup remembers the dotted key path that led to it, so a failure
//! deep inside the document is reported as e.g.
//! `model.hyperparameter_search.arguments.cv`.

use crate::error::{PipelineError, Result};
use serde::de::DeserializeOwned;
use serde_yaml::{Mapping, Value};

/// Key used for errors that concern the document as a whole
pub const DOCUMENT_KEY: &str = "<document>";

/// Parsed configuration document
#[derive(Debug, Clone)]
pub struct ConfigTree {
    root: Value,
}

impl ConfigTree {
    /// Parse YAML (or JSON, which YAML accepts) into a tree
    pub fn parse(text: &str) -> Result<Self> {
        let root: Value = serde_yaml::from_str(text)
            .map_err(|e| PipelineError::config(DOCUMENT_KEY, e.to_string()))?;
        if !root.is_mapping() {
            return Err(PipelineError::config(
                DOCUMENT_KEY,
                "top level must be a mapping of sections",
            ));
        }
        Ok(Self { root })
    }

    pub fn root(&self) -> Node<'_> {
        Node {
            value: &self.root,
            path: String::new(),
        }
    }
}

/// A value in the tree together with its key path
#[derive(Debug, Clone)]
pub struct Node<'a> {
    value: &'a Value,
    path: String,
}

impl<'a> Node<'a> {
    pub fn path(&self) -> &str {
        if self.path.is_empty() {
            DOCUMENT_KEY
        } else {
            &self.path
        }
    }

    /// Error located at this node
    pub fn error(&self, reason: impl Into<String>) -> PipelineError {
        PipelineError::config(self.path(), reason)
    }

    fn child_path(&self, key: &str) -> String {
        if self.path.is_empty() {
            key.to_string()
        } else {
            format!("{}.{}", self.path, key)
        }
    }

    fn mapping(&self) -> Result<&'a Mapping> {
        self.value
            .as_mapping()
            .ok_or_else(|| self.error(format!("expected a mapping, found {}", kind(self.value))))
    }

    /// Child by key; a key set to null counts as absent
    pub fn get(&self, key: &str) -> Result<Option<Node<'a>>> {
        let mapping = self.mapping()?;
        Ok(mapping
            .get(key)
            .filter(|v| !v.is_null())
            .map(|value| Node {
                value,
                path: self.child_path(key),
            }))
    }

    /// Child by key, failing when it is absent
    pub fn require(&self, key: &str) -> Result<Node<'a>> {
        self.get(key)?.ok_or_else(|| {
            PipelineError::config(self.child_path(key), "missing required key")
        })
    }

    /// Reject keys outside `allowed`
    pub fn deny_unknown(&self, allowed: &[&str]) -> Result<()> {
        for (key, _) in self.entries()? {
            if !allowed.contains(&key.as_str()) {
                return Err(PipelineError::config(
                    self.child_path(&key),
                    format!("unknown key; expected one of: {}", allowed.join(", ")),
                ));
            }
        }
        Ok(())
    }

    /// Mapping entries in document order
    pub fn entries(&self) -> Result<Vec<(String, Node<'a>)>> {
        self.mapping()?
            .iter()
            .map(|(k, value)| {
                let key = k
                    .as_str()
                    .ok_or_else(|| self.error("mapping keys must be strings"))?
                    .to_string();
                let path = self.child_path(&key);
                Ok((key, Node { value, path }))
            })
            .collect()
    }

    /// Sequence items; paths are suffixed with `[index]`
    pub fn items(&self) -> Result<Vec<Node<'a>>> {
        let seq = self
            .value
            .as_sequence()
            .ok_or_else(|| self.error(format!("expected a list, found {}", kind(self.value))))?;
        Ok(seq
            .iter()
            .enumerate()
            .map(|(i, value)| Node {
                value,
                path: format!("{}[{}]", self.path(), i),
            })
            .collect())
    }

    pub fn is_mapping(&self) -> bool {
        self.value.is_mapping()
    }

    pub fn is_sequence(&self) -> bool {
        self.value.is_sequence()
    }

    pub fn as_str(&self) -> Result<&'a str> {
        self.value
            .as_str()
            .ok_or_else(|| self.error(format!("expected a string, found {}", kind(self.value))))
    }

    /// Booleans may also be written as quoted `"true"` / `"false"`
    pub fn as_bool(&self) -> Result<bool> {
        match self.value {
            Value::Bool(b) => Ok(*b),
            Value::String(s) => match s.to_lowercase().as_str() {
                "true" => Ok(true),
                "false" => Ok(false),
                other => Err(self.error(format!("expected true or false, got `{}`", other))),
            },
            other => Err(self.error(format!("expected a boolean, found {}", kind(other)))),
        }
    }

    pub fn as_f64(&self) -> Result<f64> {
        self.value
            .as_f64()
            .ok_or_else(|| self.error(format!("expected a number, found {}", kind(self.value))))
    }

    pub fn as_u64(&self) -> Result<u64> {
        self.value.as_u64().ok_or_else(|| {
            self.error(format!(
                "expected a non-negative integer, found {}",
                kind(self.value)
            ))
        })
    }

    /// Deserialize a leaf (enums, scalar lists) with serde; unknown enum
    /// variants surface as errors at this node's path
    pub fn parse<T: DeserializeOwned>(&self) -> Result<T> {
        serde_yaml::from_value(self.value.clone()).map_err(|e| self.error(e.to_string()))
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Sequence(_) => "a list",
        Value::Mapping(_) => "a mapping",
        Value::Tagged(_) => "a tagged value",
    }
}
