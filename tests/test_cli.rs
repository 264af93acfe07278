//! Integration test: CLI commands and the artifacts they write

use kolosal_pipeline::cli::{
    cmd_evaluate, cmd_experiment, cmd_fit, cmd_init, cmd_models, cmd_predict, cmd_validate, DESCRIPTION_FILE,
    EVALUATION_FILE, MODEL_FILE, PREDICTIONS_FILE,
};
use kolosal_pipeline::config::load_file;
use kolosal_pipeline::descriptor::TaskType;
use polars::prelude::*;
use std::path::{Path, PathBuf};

fn write_dataset(dir: &Path, name: &str, n: usize) -> PathBuf {
    let x1: Vec<f64> = (0..n).map(|i| i as f64).collect();
    let x2: Vec<f64> = (0..n).map(|i| ((i * 13) % 7) as f64).collect();
    let y: Vec<f64> = x1.iter().zip(&x2).map(|(a, b)| 1.5 * a - b + 4.0).collect();
    let mut df = df!("x1" => x1, "x2" => x2, "y" => y).unwrap();

    let path = dir.join(name);
    let mut file = std::fs::File::create(&path).unwrap();
    CsvWriter::new(&mut file).finish(&mut df).unwrap();
    path
}

fn write_config(dir: &Path) -> PathBuf {
    let path = dir.join("igel.yaml");
    cmd_init("regression", "linearregression", "y", &path).unwrap();
    path
}

#[test]
fn test_init_writes_loadable_document() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path());

    let descriptor = load_file(&config).unwrap();
    assert_eq!(descriptor.model.task_type, TaskType::Regression);
    // catalog spelling wins over the user's casing
    assert_eq!(descriptor.model.algorithm, "LinearRegression");
    assert_eq!(descriptor.target.columns(), &["y".to_string()]);
    assert!(cmd_validate(&config).is_ok());
}

#[test]
fn test_init_rejects_unsupported_pairs() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("igel.yaml");
    assert!(cmd_init("classification", "LinearRegression", "y", &out).is_err());
    assert!(cmd_init("regression", "Perceptron", "y", &out).is_err());
    assert!(cmd_init("clustering", "KNN", "y", &out).is_err());
    assert!(!out.exists());
}

#[test]
fn test_fit_evaluate_predict() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path());
    let train = write_dataset(dir.path(), "train.csv", 60);
    let output = dir.path().join("model_results");

    let pipeline = cmd_fit(&train, &config, &output, Some(1)).unwrap();
    assert!(pipeline.has_model());
    for file in [MODEL_FILE, DESCRIPTION_FILE, EVALUATION_FILE] {
        assert!(output.join(file).exists(), "{} missing", file);
    }
    assert_eq!(load_file(output.join(DESCRIPTION_FILE)).unwrap(), pipeline.descriptor);

    let eval = write_dataset(dir.path(), "eval.csv", 20);
    let report = cmd_evaluate(&eval, &output).unwrap();
    assert_eq!(report.n_samples, 20);
    assert!(report.metrics("y").unwrap().r2.unwrap() > 0.99);

    let predictions = cmd_predict(&eval, &output).unwrap();
    assert_eq!(predictions.height(), 20);
    let written = std::fs::read_to_string(output.join(PREDICTIONS_FILE)).unwrap();
    assert!(written.starts_with("y\n"));
    assert_eq!(written.lines().count(), 21);
}

#[test]
fn test_evaluate_without_fit_fails() {
    let dir = tempfile::tempdir().unwrap();
    let eval = write_dataset(dir.path(), "eval.csv", 10);
    let err = cmd_evaluate(&eval, &dir.path().join("model_results")).unwrap_err();
    assert!(err.to_string().contains("run `fit` first"));
}

#[test]
fn test_experiment_runs_all_three() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path());
    let train = write_dataset(dir.path(), "train.csv", 50);
    let eval = write_dataset(dir.path(), "eval.csv", 15);
    let predict = write_dataset(dir.path(), "predict.csv", 5);
    let output = dir.path().join("results");

    cmd_experiment(&train, &eval, &predict, &config, &output, Some(3)).unwrap();
    assert!(output.join(EVALUATION_FILE).exists());
    assert!(output.join(PREDICTIONS_FILE).exists());
}

#[test]
fn test_models_lookup() {
    assert!(cmd_models(None, None).is_ok());
    assert!(cmd_models(Some("classification"), None).is_ok());
    assert!(cmd_models(None, Some("RandomForest")).is_ok());
    assert!(cmd_models(None, Some("Perceptron")).is_err());
}
