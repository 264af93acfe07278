//! Integration test: full pipeline (load → split → preprocess → search/fit → evaluate → predict)

use kolosal_pipeline::config::load_str;
use kolosal_pipeline::pipeline::{FittedPipeline, PipelineDispatcher, Stage};
use kolosal_pipeline::training::TrainedModel;
use polars::prelude::*;
use std::io::Write;

fn patients(n: usize) -> DataFrame {
    let mut age = Vec::with_capacity(n);
    let mut pressure = Vec::with_capacity(n);
    let mut smoker = Vec::with_capacity(n);
    let mut sick = Vec::with_capacity(n);

    for i in 0..n {
        let a = 20.0 + (i % 50) as f64;
        let p = 100.0 + ((i * 7) % 60) as f64;
        age.push(if i % 17 == 3 { None } else { Some(a) });
        pressure.push(p);
        smoker.push(if i % 3 == 0 { "yes" } else { "no" });
        sick.push(if a + 0.5 * (p - 100.0) > 50.0 { "sick" } else { "healthy" });
    }

    df!(
        "age" => age,
        "pressure" => pressure,
        "smoker" => smoker,
        "sick" => sick
    )
    .unwrap()
}

fn write_csv(df: &DataFrame) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
    CsvWriter::new(&mut file).finish(&mut df.clone()).unwrap();
    file.flush().unwrap();
    file
}

const CLASSIFICATION: &str = r#"
dataset:
    type: csv
    split:
        test_size: 0.25
        shuffle: true
        stratify: true
    preprocess:
        missing_values: median
        encoding:
            type: oneHotEncoding
        scale:
            method: standard
            target: inputs
model:
    type: classification
    algorithm: DecisionTree
    hyperparameter_search:
        method: grid_search
        parameter_grid:
            max_depth: [2, 4, null]
            criterion: [gini, entropy]
        arguments:
            cv: 3
            refit: true
            return_train_score: true
            verbose: 1
target:
    - sick
"#;

#[test]
fn test_classification_with_grid_search() {
    let data = write_csv(&patients(120));
    let descriptor = load_str(CLASSIFICATION).unwrap();

    let run = PipelineDispatcher::new()
        .with_seed(42)
        .run(&descriptor, data.path())
        .unwrap();

    let stages: Vec<Stage> = run.stages.iter().map(|s| s.stage).collect();
    assert_eq!(
        stages,
        vec![
            Stage::Load,
            Stage::Split,
            Stage::Preprocess,
            Stage::BuildModel,
            Stage::Search,
            Stage::Evaluate
        ]
    );
    assert_eq!(run.train_rows + run.test_rows, 120);

    // every combination scored once
    let search = run.pipeline.targets[0].search.as_ref().unwrap();
    assert_eq!(search.candidates.len(), 6);
    assert!(search.candidates.iter().all(|c| c.fold_test_scores.len() == 3));
    assert!(search.candidates.iter().all(|c| c.mean_train_score.is_some()));

    let metrics = run.evaluation.as_ref().unwrap().metrics("sick").unwrap();
    assert!(metrics.accuracy.unwrap() > 0.8);
    assert!(metrics.f1_score.is_some());
    assert!(metrics.r2.is_none());
}

#[test]
fn test_seeded_runs_are_reproducible() {
    let df = patients(80);
    let descriptor = load_str(CLASSIFICATION).unwrap();

    let a = PipelineDispatcher::new().with_seed(9).run_frame(&descriptor, df.clone()).unwrap();
    let b = PipelineDispatcher::new().with_seed(9).run_frame(&descriptor, df).unwrap();

    let search_a = a.pipeline.targets[0].search.as_ref().unwrap();
    let search_b = b.pipeline.targets[0].search.as_ref().unwrap();
    assert_eq!(search_a.best_params, search_b.best_params);
    assert_eq!(search_a.best_score, search_b.best_score);
    assert_eq!(a.evaluation, b.evaluation);
}

#[test]
fn test_refit_false_keeps_no_model() {
    let text = CLASSIFICATION.replace("refit: true", "refit: false");
    let descriptor = load_str(&text).unwrap();
    let run = PipelineDispatcher::new()
        .with_seed(1)
        .run_frame(&descriptor, patients(60))
        .unwrap();

    assert!(!run.pipeline.has_model());
    assert!(run.evaluation.is_none());
    assert!(!run.pipeline.targets[0].search.as_ref().unwrap().refit);
}

#[test]
fn test_failing_stage_is_named() {
    let descriptor = load_str(CLASSIFICATION).unwrap();

    let err = PipelineDispatcher::new()
        .run(&descriptor, "/no/such/dir/patients.csv")
        .unwrap_err();
    assert_eq!(err.stage(), Some(Stage::Load));
    assert!(err.to_string().starts_with("Stage `load` failed"));

    let without_target = patients(40).drop("sick").unwrap();
    let err = PipelineDispatcher::new()
        .run_frame(&descriptor, without_target)
        .unwrap_err();
    assert_eq!(err.stage(), Some(Stage::Split));

    let bad_grid = CLASSIFICATION.replace("criterion: [gini, entropy]", "depth: [1, 2]");
    let err = PipelineDispatcher::new()
        .run_frame(&load_str(&bad_grid).unwrap(), patients(40))
        .unwrap_err();
    assert_eq!(err.stage(), Some(Stage::Search));
    assert!(err.is_fit());
}

#[test]
fn test_saved_pipeline_predicts_identically() {
    let descriptor = load_str(CLASSIFICATION).unwrap();
    let run = PipelineDispatcher::new()
        .with_seed(3)
        .run_frame(&descriptor, patients(100))
        .unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("model.json");
    run.pipeline.save(&path).unwrap();
    let loaded: FittedPipeline<TrainedModel> = FittedPipeline::load(&path).unwrap();

    let new_rows = patients(30).drop("sick").unwrap();
    let before = run.pipeline.predict(&new_rows).unwrap();
    let after = loaded.predict(&new_rows).unwrap();
    assert!(before.equals(&after));
    assert_eq!(before.width(), 1);
    assert!(before.column("sick").is_ok());

    let labelled = patients(30);
    assert_eq!(
        run.pipeline.evaluate(&labelled).unwrap(),
        loaded.evaluate(&labelled).unwrap()
    );
}

#[test]
fn test_regression_forest_with_random_search() {
    let text = r#"
dataset:
    split: {test_size: 0.2, shuffle: true}
    preprocess:
        - scale: {method: minmax, target: all}
model:
    type: regression
    algorithm: RandomForest
    arguments: {bootstrap: true}
    hyperparameter_search:
        method: random_search
        parameter_grid:
            n_estimators: [5, 10, 20]
            max_depth: [3, 6]
        arguments: {cv: 3, n_iter: 4}
target: [y]
"#;
    let x: Vec<f64> = (0..100).map(|i| i as f64 / 10.0).collect();
    let y: Vec<f64> = x.iter().map(|v| 2.0 * v + 1.0).collect();
    let df = df!("x" => x, "y" => y).unwrap();

    let run = PipelineDispatcher::new()
        .with_seed(7)
        .run_frame(&load_str(text).unwrap(), df)
        .unwrap();

    let search = run.pipeline.targets[0].search.as_ref().unwrap();
    assert_eq!(search.candidates.len(), 4);
    assert_eq!(search.scoring, "r2");
    assert!(run.pipeline.preprocessor.scales_outputs());

    let metrics = run.evaluation.unwrap();
    assert!(metrics.metrics("y").unwrap().r2.unwrap() > 0.9);

    // predictions come back in original units
    let predictions = run.pipeline.predict(&df!("x" => &[5.0]).unwrap()).unwrap();
    let y = predictions.column("y").unwrap().f64().unwrap().get(0).unwrap();
    assert!((y - 11.0).abs() < 1.5);
}
