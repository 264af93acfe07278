//! Configuration loading
//!
//! Turns a YAML/JSON pipeline document into a validated
//! [`PipelineDescriptor`]. Section layout:
//!
//! ```yaml
//! dataset:
//!   type: csv
//!   read_data_options: {sep: ",", has_header: true, skip_rows: 0}
//!   split: {test_size: 0.2, shuffle: true, stratify: false}
//!   preprocess:
//!     missing_values: mean
//!     encoding: {type: oneHotEncoding}
//!     scale: {method: standard, target: inputs}
//! model:
//!   type: classification
//!   algorithm: RandomForest
//!   arguments: {n_estimators: 100}
//!   hyperparameter_search:
//!     method: grid_search
//!     parameter_grid: {max_depth: [4, 8]}
//!     arguments: {cv: 5, refit: true, return_train_score: false, verbose: 0}
//! target:
//!   - label
//! ```

mod tree;
pub mod template;

pub use tree::{ConfigTree, Node, DOCUMENT_KEY};

use crate::descriptor::{
    DatasetSpec, ModelSpec, ParamValue, Params, PipelineDescriptor, PreprocessStep, ReadOptions,
    SearchArguments, SearchSpec, SplitSpec, TargetSpec,
};
use crate::error::{PipelineError, Result};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

const TOP_LEVEL_KEYS: &[&str] = &["dataset", "model", "target"];
const DATASET_KEYS: &[&str] = &["type", "read_data_options", "split", "preprocess"];
const READ_OPTION_KEYS: &[&str] = &["sep", "delimiter", "has_header", "skip_rows"];
const SPLIT_KEYS: &[&str] = &["test_size", "shuffle", "stratify"];
const MODEL_KEYS: &[&str] = &["type", "algorithm", "arguments", "hyperparameter_search"];
const SEARCH_KEYS: &[&str] = &["method", "parameter_grid", "arguments"];
const SEARCH_ARGUMENT_KEYS: &[&str] = &["cv", "refit", "return_train_score", "verbose", "n_iter"];
const STEP_KEYS: &[&str] = &["missing_values", "encoding", "scale"];

/// Load a descriptor from configuration text
pub fn load_str(text: &str) -> Result<PipelineDescriptor> {
    let tree = ConfigTree::parse(text)?;
    let descriptor = build_descriptor(tree.root())?;
    descriptor.validate()?;
    Ok(descriptor)
}

/// Load a descriptor from a file on disk
pub fn load_file(path: impl AsRef<Path>) -> Result<PipelineDescriptor> {
    let path = path.as_ref();
    debug!(path = %path.display(), "Reading pipeline configuration");
    let text = std::fs::read_to_string(path).map_err(|e| {
        PipelineError::config(DOCUMENT_KEY, format!("cannot read {}: {}", path.display(), e))
    })?;
    load_str(&text)
}

/// Serialize a descriptor back to the document schema
pub fn to_yaml(descriptor: &PipelineDescriptor) -> Result<String> {
    Ok(serde_yaml::to_string(descriptor)?)
}

fn build_descriptor(root: Node<'_>) -> Result<PipelineDescriptor> {
    root.deny_unknown(TOP_LEVEL_KEYS)?;

    let dataset = match root.get("dataset")? {
        Some(node) => dataset_spec(&node)?,
        None => DatasetSpec::default(),
    };
    let model = model_spec(&root.require("model")?)?;
    let target = target_spec(&root.require("target")?)?;

    Ok(PipelineDescriptor::new(dataset, model, target))
}

fn dataset_spec(node: &Node<'_>) -> Result<DatasetSpec> {
    node.deny_unknown(DATASET_KEYS)?;
    let mut spec = DatasetSpec::default();

    if let Some(format) = node.get("type")? {
        spec.format = format.parse()?;
    }
    if let Some(options) = node.get("read_data_options")? {
        spec.read_options = read_options(&options)?;
    }
    if let Some(split) = node.get("split")? {
        spec.split = split_spec(&split)?;
    }
    if let Some(preprocess) = node.get("preprocess")? {
        spec.preprocess = preprocess_steps(&preprocess)?;
    }

    Ok(spec)
}

fn read_options(node: &Node<'_>) -> Result<ReadOptions> {
    node.deny_unknown(READ_OPTION_KEYS)?;
    let mut options = ReadOptions::default();

    let separator = match (node.get("sep")?, node.get("delimiter")?) {
        (Some(_), Some(delimiter)) => {
            return Err(delimiter.error("`sep` and `delimiter` are mutually exclusive"))
        }
        (Some(sep), None) => Some(sep),
        (None, delimiter) => delimiter,
    };
    if let Some(sep) = separator {
        let text = sep.as_str()?;
        let mut chars = text.chars();
        options.separator = match (chars.next(), chars.next()) {
            (Some(c), None) if c.is_ascii() => c,
            _ => return Err(sep.error(format!("expected a single ASCII character, got `{}`", text))),
        };
    }
    if let Some(header) = node.get("has_header")? {
        options.has_header = header.as_bool()?;
    }
    if let Some(skip) = node.get("skip_rows")? {
        options.skip_rows = skip.as_u64()? as usize;
    }

    Ok(options)
}

fn split_spec(node: &Node<'_>) -> Result<SplitSpec> {
    node.deny_unknown(SPLIT_KEYS)?;
    let mut split = SplitSpec::default();

    if let Some(test_size) = node.get("test_size")? {
        split.test_size = test_size.as_f64()?;
    }
    if let Some(shuffle) = node.get("shuffle")? {
        split.shuffle = shuffle.as_bool()?;
    }
    if let Some(stratify) = node.get("stratify")? {
        split.stratify = stratify.as_bool()?;
    }

    Ok(split)
}

/// Steps come either as a mapping (one entry per step, document order) or as
/// a list of single-key mappings
fn preprocess_steps(node: &Node<'_>) -> Result<Vec<PreprocessStep>> {
    if node.is_sequence() {
        node.items()?
            .iter()
            .map(|item| {
                let entries = item.entries()?;
                match entries.as_slice() {
                    [(key, body)] => preprocess_step(key, body),
                    _ => Err(item.error("each step must be a mapping with exactly one key")),
                }
            })
            .collect()
    } else {
        node.deny_unknown(STEP_KEYS)?;
        node.entries()?
            .iter()
            .map(|(key, body)| preprocess_step(key, body))
            .collect()
    }
}

fn preprocess_step(key: &str, body: &Node<'_>) -> Result<PreprocessStep> {
    match key {
        "missing_values" => Ok(PreprocessStep::MissingValues(body.parse()?)),
        "encoding" => {
            body.deny_unknown(&["type"])?;
            Ok(PreprocessStep::Encoding {
                method: body.require("type")?.parse()?,
            })
        }
        "scale" => {
            body.deny_unknown(&["method", "target"])?;
            let method = body.require("method")?.parse()?;
            let target = match body.get("target")? {
                Some(target) => target.parse()?,
                None => Default::default(),
            };
            Ok(PreprocessStep::Scale { method, target })
        }
        other => Err(body.error(format!(
            "unknown preprocessing step `{}`; expected one of: {}",
            other,
            STEP_KEYS.join(", ")
        ))),
    }
}

fn model_spec(node: &Node<'_>) -> Result<ModelSpec> {
    node.deny_unknown(MODEL_KEYS)?;

    let task_type = node.require("type")?.parse()?;
    let algorithm = node.require("algorithm")?.as_str()?.to_string();
    let mut spec = ModelSpec::new(task_type, algorithm);

    if let Some(arguments) = node.get("arguments")? {
        spec.arguments = params(&arguments)?;
    }
    if let Some(search) = node.get("hyperparameter_search")? {
        spec.search = Some(search_spec(&search)?);
    }

    Ok(spec)
}

fn params(node: &Node<'_>) -> Result<Params> {
    node.entries()?
        .into_iter()
        .map(|(name, value)| {
            if value.is_mapping() || value.is_sequence() {
                return Err(value.error("expected a scalar value"));
            }
            Ok((name, value.parse::<ParamValue>()?))
        })
        .collect()
}

fn search_spec(node: &Node<'_>) -> Result<SearchSpec> {
    node.deny_unknown(SEARCH_KEYS)?;

    let method = node.require("method")?.parse()?;
    let mut grid = BTreeMap::new();
    for (name, values) in node.require("parameter_grid")?.entries()? {
        // a bare scalar is a single-candidate list
        let candidates: Vec<ParamValue> = if values.is_sequence() {
            values.parse()?
        } else {
            vec![values.parse()?]
        };
        grid.insert(name, candidates);
    }

    let mut search = SearchSpec::new(method);
    search.parameter_grid = grid;
    if let Some(arguments) = node.get("arguments")? {
        search.arguments = search_arguments(&arguments)?;
    }

    Ok(search)
}

fn search_arguments(node: &Node<'_>) -> Result<SearchArguments> {
    node.deny_unknown(SEARCH_ARGUMENT_KEYS)?;
    let mut args = SearchArguments::default();

    if let Some(cv) = node.get("cv")? {
        args.cv = cv.as_u64()? as usize;
    }
    if let Some(refit) = node.get("refit")? {
        args.refit = refit.as_bool()?;
    }
    if let Some(train_score) = node.get("return_train_score")? {
        args.return_train_score = train_score.as_bool()?;
    }
    if let Some(verbose) = node.get("verbose")? {
        args.verbose = u32::try_from(verbose.as_u64()?)
            .map_err(|_| verbose.error("verbosity out of range"))?;
    }
    if let Some(n_iter) = node.get("n_iter")? {
        args.n_iter = n_iter.as_u64()? as usize;
    }

    Ok(args)
}

/// `target` is a list of column names; a single string is accepted too
fn target_spec(node: &Node<'_>) -> Result<TargetSpec> {
    if node.is_sequence() {
        let columns = node
            .items()?
            .iter()
            .map(|item| item.as_str().map(str::to_string))
            .collect::<Result<Vec<_>>>()?;
        Ok(TargetSpec::new(columns))
    } else {
        Ok(TargetSpec::new([node.as_str()?]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{EncodingMethod, ImputeStrategy, ScaleMethod, ScaleTarget, SearchMethod, TaskType};

    const MINIMAL: &str = r#"
model:
  type: regression
  algorithm: LinearRegression
target:
  - price
"#;

    fn config_key(err: PipelineError) -> String {
        match err {
            PipelineError::Config { key, .. } => key,
            other => panic!("expected a config error, got {other:?}"),
        }
    }

    #[test]
    fn test_minimal_document_uses_defaults() {
        let d = load_str(MINIMAL).unwrap();
        assert_eq!(d.dataset, DatasetSpec::default());
        assert_eq!(d.model.task_type, TaskType::Regression);
        assert_eq!(d.target.columns(), ["price"]);
        assert!(d.model.search.is_none());
    }

    #[test]
    fn test_missing_target() {
        let err = load_str("model:\n  type: regression\n  algorithm: Ridge\n").unwrap_err();
        assert_eq!(config_key(err), "target");
    }

    #[test]
    fn test_missing_model_algorithm() {
        let err = load_str("model:\n  type: regression\ntarget: [y]\n").unwrap_err();
        assert_eq!(config_key(err), "model.algorithm");
    }

    #[test]
    fn test_unknown_task_type() {
        let err = load_str("model:\n  type: clustering\n  algorithm: KMeans\ntarget: [y]\n").unwrap_err();
        assert_eq!(config_key(err), "model.type");
    }

    #[test]
    fn test_unknown_scale_method() {
        let doc = format!("dataset:\n  preprocess:\n    scale:\n      method: quantile\n{}", MINIMAL);
        let err = load_str(&doc).unwrap_err();
        assert_eq!(config_key(err), "dataset.preprocess.scale.method");
    }

    #[test]
    fn test_unknown_key_rejected() {
        let doc = format!("dataset:\n  split:\n    test_sise: 0.3\n{}", MINIMAL);
        let err = load_str(&doc).unwrap_err();
        assert_eq!(config_key(err), "dataset.split.test_sise");
    }

    #[test]
    fn test_preprocess_mapping_keeps_order() {
        let doc = format!(
            "dataset:\n  preprocess:\n    scale: {{method: minmax}}\n    missing_values: median\n    encoding: {{type: labelEncoding}}\n{}",
            MINIMAL
        );
        let d = load_str(&doc).unwrap();
        assert_eq!(
            d.dataset.preprocess,
            vec![
                PreprocessStep::scale(ScaleMethod::MinMax, ScaleTarget::Inputs),
                PreprocessStep::MissingValues(ImputeStrategy::Median),
                PreprocessStep::Encoding { method: EncodingMethod::Label },
            ]
        );
    }

    #[test]
    fn test_preprocess_list_form() {
        let doc = format!(
            "dataset:\n  preprocess:\n    - missing_values: drop\n    - scale: {{method: standard, target: all}}\n    - scale: {{method: minmax}}\n{}",
            MINIMAL
        );
        let d = load_str(&doc).unwrap();
        assert_eq!(d.dataset.preprocess.len(), 3);
        assert_eq!(d.dataset.preprocess[1], PreprocessStep::scale(ScaleMethod::Standard, ScaleTarget::All));
    }

    #[test]
    fn test_search_section() {
        let doc = r#"
model:
  type: classification
  algorithm: KNN
  hyperparameter_search:
    method: grid_search
    parameter_grid:
      n_neighbors: [3, 5]
      weights: uniform
    arguments:
      cv: 3
      verbose: 2
target: label
"#;
        let d = load_str(doc).unwrap();
        let search = d.model.search.unwrap();
        assert_eq!(search.method, SearchMethod::GridSearch);
        assert_eq!(search.parameter_grid["weights"], vec![ParamValue::Str("uniform".into())]);
        assert_eq!(search.arguments.cv, 3);
        assert_eq!(search.arguments.verbose, 2);
        assert!(search.arguments.refit);
    }

    #[test]
    fn test_zero_cv_rejected() {
        let doc = r#"
model:
  type: regression
  algorithm: Ridge
  hyperparameter_search:
    method: random_search
    parameter_grid: {alpha: [0.1, 1.0]}
    arguments: {cv: 0}
target: [y]
"#;
        let err = load_str(doc).unwrap_err();
        assert_eq!(config_key(err), "model.hyperparameter_search.arguments.cv");
    }

    #[test]
    fn test_sep_must_be_single_char() {
        let doc = format!("dataset:\n  read_data_options:\n    sep: ';;'\n{}", MINIMAL);
        let err = load_str(&doc).unwrap_err();
        assert_eq!(config_key(err), "dataset.read_data_options.sep");
    }

    #[test]
    fn test_json_document() {
        let doc = r#"{"model": {"type": "regression", "algorithm": "Ridge", "arguments": {"alpha": 0.5}}, "target": ["y"]}"#;
        let d = load_str(doc).unwrap();
        assert_eq!(d.model.arguments["alpha"], ParamValue::Float(0.5));
    }
}
