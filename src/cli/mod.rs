//! Command-line interface
//!
//! `fit` writes its artifacts into an output directory (`model_results` by
//! default); `evaluate` and `predict` read the fitted pipeline back from it.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use colored::*;
use polars::prelude::*;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::config::{self, template};
use crate::dataset::{DatasetReader, PolarsReader};
use crate::descriptor::TaskType;
use crate::pipeline::{EvaluationReport, FittedPipeline, PipelineDispatcher, RunOptions};
use crate::search::format_params;
use crate::training::metrics::supported_metrics;
use crate::training::{find_algorithm, TrainedModel, CATALOG};

pub const MODEL_FILE: &str = "model.json";
pub const DESCRIPTION_FILE: &str = "description.yaml";
pub const EVALUATION_FILE: &str = "evaluation.json";
pub const PREDICTIONS_FILE: &str = "predictions.csv";

// ─── Styling helpers ───────────────────────────────────────────────────────────

const W: usize = 58; // box inner width

fn dim(s: &str) -> ColoredString   { s.truecolor(100, 100, 100) }
fn accent(s: &str) -> ColoredString { s.truecolor(120, 170, 255) }
fn muted(s: &str) -> ColoredString  { s.truecolor(140, 140, 140) }
fn ok(s: &str) -> ColoredString     { s.truecolor(100, 210, 120) }

fn line_box_top()    { println!("  {}", dim("┌─────────────────────────────────────────────────────────┐")); }
fn line_box_bottom() { println!("  {}", dim("└─────────────────────────────────────────────────────────┘")); }
fn line_box_sep()    { println!("  {}", dim("├─────────────────────────────────────────────────────────┤")); }

fn line_box(content: &str) {
    let visible_len = strip_ansi(content).chars().count();
    let pad = W.saturating_sub(visible_len);
    println!("  {}  {}{} {}", dim("│"), content, " ".repeat(pad), dim("│"));
}

fn line_box_center(content: &str) {
    let visible_len = strip_ansi(content).chars().count();
    let total_pad = W.saturating_sub(visible_len);
    let left = total_pad / 2;
    let right = total_pad - left;
    println!("  {}  {}{}{} {}", dim("│"), " ".repeat(left), content, " ".repeat(right), dim("│"));
}

fn line_box_empty() { line_box(""); }

fn strip_ansi(s: &str) -> String {
    let mut out = String::new();
    let mut in_escape = false;
    for c in s.chars() {
        if c == '\x1b' { in_escape = true; continue; }
        if in_escape { if c == 'm' { in_escape = false; } continue; }
        out.push(c);
    }
    out
}

fn kv(key: &str, val: &str) -> String {
    format!("{} {}", muted(key), val.white())
}

fn step_ok(msg: &str) {
    println!("  {} {}", ok("✓"), msg);
}

fn step_run(msg: &str) {
    print!("  {} {}... ", accent("›"), msg);
}

fn step_done(detail: &str) {
    println!("{} {}", ok("done"), dim(detail));
}

fn section(title: &str) {
    println!();
    println!("  {}", title.white().bold());
    println!("  {}", dim(&"─".repeat(56)));
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "kolosal-pipeline")]
#[command(author = "KolosalAI")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Configuration-driven machine learning pipelines")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write a starter pipeline document
    Init {
        /// Task type (classification, regression)
        #[arg(short, long, default_value = "regression")]
        task: String,

        /// Algorithm name (see `models`)
        #[arg(short, long, default_value = "RandomForest")]
        model: String,

        /// Target column name
        #[arg(long)]
        target: String,

        /// Output document
        #[arg(short, long, default_value = "igel.yaml")]
        output: PathBuf,
    },

    /// Load a pipeline document and print it normalized
    Validate {
        /// Pipeline document (YAML or JSON)
        #[arg(short, long)]
        config: PathBuf,
    },

    /// Fit a pipeline on a dataset
    Fit {
        /// Training data file (CSV, JSON, or Parquet)
        #[arg(short, long)]
        data: PathBuf,

        /// Pipeline document
        #[arg(short, long)]
        config: PathBuf,

        /// Artifact directory
        #[arg(short, long, default_value = "model_results")]
        output: PathBuf,

        /// Seed for shuffling, search sampling and model randomness
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Evaluate a fitted pipeline on labelled data
    Evaluate {
        /// Evaluation data file
        #[arg(short, long)]
        data: PathBuf,

        /// Artifact directory written by `fit`
        #[arg(short, long, default_value = "model_results")]
        output: PathBuf,
    },

    /// Predict with a fitted pipeline
    Predict {
        /// Data file to predict on
        #[arg(short, long)]
        data: PathBuf,

        /// Artifact directory written by `fit`
        #[arg(short, long, default_value = "model_results")]
        output: PathBuf,
    },

    /// Fit, evaluate and predict in one go
    Experiment {
        /// Training data file
        #[arg(long)]
        train: PathBuf,

        /// Evaluation data file
        #[arg(long)]
        eval: PathBuf,

        /// Data file to predict on
        #[arg(long)]
        predict: PathBuf,

        /// Pipeline document
        #[arg(short, long)]
        config: PathBuf,

        /// Artifact directory
        #[arg(short, long, default_value = "model_results")]
        output: PathBuf,

        /// Seed for shuffling, search sampling and model randomness
        #[arg(long)]
        seed: Option<u64>,
    },

    /// List supported algorithms, or the parameters of one
    Models {
        /// Only algorithms supporting this task
        #[arg(short, long)]
        task: Option<String>,

        /// Show parameters of this algorithm
        #[arg(short, long)]
        name: Option<String>,
    },

    /// List supported metrics
    Metrics,

    /// Show package information
    Info,
}

/// Run the parsed command
pub fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Init { task, model, target, output } => cmd_init(&task, &model, &target, &output),
        Commands::Validate { config } => cmd_validate(&config),
        Commands::Fit { data, config, output, seed } => cmd_fit(&data, &config, &output, seed).map(|_| ()),
        Commands::Evaluate { data, output } => cmd_evaluate(&data, &output).map(|_| ()),
        Commands::Predict { data, output } => cmd_predict(&data, &output).map(|_| ()),
        Commands::Experiment { train, eval, predict, config, output, seed } => {
            cmd_experiment(&train, &eval, &predict, &config, &output, seed)
        }
        Commands::Models { task, name } => cmd_models(task.as_deref(), name.as_deref()),
        Commands::Metrics => cmd_metrics(),
        Commands::Info => cmd_info(),
    }
}

fn parse_task(task: &str) -> anyhow::Result<TaskType> {
    match task.to_ascii_lowercase().as_str() {
        "classification" => Ok(TaskType::Classification),
        "regression" => Ok(TaskType::Regression),
        _ => bail!("Invalid task type: {} (expected classification or regression)", task),
    }
}

fn load_pipeline(output: &Path) -> anyhow::Result<FittedPipeline<TrainedModel>> {
    let path = output.join(MODEL_FILE);
    FittedPipeline::load(&path)
        .with_context(|| format!("no fitted pipeline at {}; run `fit` first", path.display()))
}

fn read_like_training(pipeline: &FittedPipeline<TrainedModel>, data: &Path) -> anyhow::Result<DataFrame> {
    step_run("Loading data");
    let start = Instant::now();
    let df = PolarsReader::new().read(data, &pipeline.descriptor.dataset)?;
    step_done(&format!("{} rows × {} cols in {:?}", df.height(), df.width(), start.elapsed()));
    Ok(df)
}

fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> anyhow::Result<()> {
    std::fs::write(path, serde_json::to_string_pretty(value)?)?;
    Ok(())
}

fn print_evaluation(report: &EvaluationReport) {
    for target in &report.targets {
        println!();
        println!("  {} {}", muted("target"), target.target.white().bold());
        for (name, value) in target.metrics.entries() {
            println!("  {:<16} {}", muted(name), format!("{:.4}", value).white());
        }
    }
}

// ─── Commands ──────────────────────────────────────────────────────────────────

pub fn cmd_init(task: &str, model: &str, target: &str, output: &Path) -> anyhow::Result<()> {
    section("Init");

    let task = parse_task(task)?;
    let Some(info) = find_algorithm(model) else {
        bail!("Unknown algorithm: {} (run `models` for the list)", model);
    };
    if !info.supports(task) {
        bail!("{} does not support {}", info.name, task);
    }

    let document = template::init_document(task, info.name, target)?;
    std::fs::write(output, document)?;
    step_ok(&format!("{} {} pipeline written to {}", info.name.cyan(), task, output.display()));
    println!();
    Ok(())
}

pub fn cmd_validate(config_path: &Path) -> anyhow::Result<()> {
    section("Validate");

    let descriptor = config::load_file(config_path)?;
    step_ok(&format!("{} is valid", config_path.display()));
    println!();
    println!("{}", config::to_yaml(&descriptor)?);
    Ok(())
}

pub fn cmd_fit(
    data: &Path,
    config_path: &Path,
    output: &Path,
    seed: Option<u64>,
) -> anyhow::Result<FittedPipeline<TrainedModel>> {
    section("Fit");

    step_run("Loading pipeline document");
    let descriptor = config::load_file(config_path)?;
    step_done(&format!(
        "{} {}",
        descriptor.model.task_type,
        descriptor.model.algorithm
    ));

    step_run("Running pipeline");
    let start = Instant::now();
    let options = RunOptions { seed };
    let run = PipelineDispatcher::new()
        .with_options(options)
        .run(&descriptor, data)?;
    step_done(&format!(
        "{} train / {} test rows in {:?}",
        run.train_rows,
        run.test_rows,
        start.elapsed()
    ));

    for target in &run.pipeline.targets {
        if let Some(search) = &target.search {
            println!();
            println!(
                "  {:<16} {} {}",
                muted("best params"),
                format_params(&search.best().params).white(),
                dim(&format!("({} candidates, {} folds)", search.candidates.len(), search.cv))
            );
            println!("  {:<16} {}", muted(&search.scoring), format!("{:.4}", search.best_score).white().bold());
        }
    }

    std::fs::create_dir_all(output)?;
    run.pipeline.save(output.join(MODEL_FILE))?;
    std::fs::write(output.join(DESCRIPTION_FILE), config::to_yaml(&descriptor)?)?;
    step_ok(&format!("Pipeline saved to {}", output.join(MODEL_FILE).display()));

    match &run.evaluation {
        Some(report) => {
            write_json(&output.join(EVALUATION_FILE), report)?;
            print_evaluation(report);
        }
        None => println!("  {}", "No model kept (refit: false); evaluation skipped".yellow()),
    }

    println!();
    Ok(run.pipeline)
}

pub fn cmd_evaluate(data: &Path, output: &Path) -> anyhow::Result<EvaluationReport> {
    section("Evaluate");

    let pipeline = load_pipeline(output)?;
    let df = read_like_training(&pipeline, data)?;

    step_run("Evaluating");
    let report = pipeline.evaluate(&df)?;
    step_done(&format!("{} rows", report.n_samples));

    write_json(&output.join(EVALUATION_FILE), &report)?;
    print_evaluation(&report);
    println!();
    step_ok(&format!("Results written to {}", output.join(EVALUATION_FILE).display()));
    println!();
    Ok(report)
}

pub fn cmd_predict(data: &Path, output: &Path) -> anyhow::Result<DataFrame> {
    section("Predict");

    let pipeline = load_pipeline(output)?;
    let df = read_like_training(&pipeline, data)?;

    step_run("Predicting");
    let mut predictions = pipeline.predict(&df)?;
    step_done(&format!("{} rows", predictions.height()));

    let path = output.join(PREDICTIONS_FILE);
    let mut file = std::fs::File::create(&path)?;
    CsvWriter::new(&mut file).finish(&mut predictions)?;
    step_ok(&format!("Predictions written to {}", path.display()));
    println!();
    Ok(predictions)
}

pub fn cmd_experiment(
    train: &Path,
    eval: &Path,
    predict: &Path,
    config_path: &Path,
    output: &Path,
    seed: Option<u64>,
) -> anyhow::Result<()> {
    cmd_fit(train, config_path, output, seed)?;
    cmd_evaluate(eval, output)?;
    cmd_predict(predict, output)?;
    Ok(())
}

pub fn cmd_models(task: Option<&str>, name: Option<&str>) -> anyhow::Result<()> {
    if let Some(name) = name {
        let Some(info) = find_algorithm(name) else {
            bail!("Unknown algorithm: {}", name);
        };
        section(info.name);
        println!("  {:<16} {}", muted("description"), info.description);
        let tasks: Vec<&str> = info.tasks.iter().map(|t| t.as_str()).collect();
        println!("  {:<16} {}", muted("tasks"), tasks.join(", "));
        println!();
        println!("  {:<20} {:<22} {}", muted("Parameter"), muted("Default"), muted("Description"));
        println!("  {}", dim(&"─".repeat(72)));
        for param in info.params {
            println!("  {:<20} {:<22} {}", param.name.white(), param.default, muted(param.description));
        }
        println!();
        return Ok(());
    }

    let task = task.map(parse_task).transpose()?;
    section("Models");
    println!("  {:<22} {:<16} {:<16}", muted("Algorithm"), muted("classification"), muted("regression"));
    println!("  {}", dim(&"─".repeat(54)));
    for info in CATALOG.iter().filter(|info| task.map_or(true, |t| info.supports(t))) {
        let mark = |t: TaskType| if info.supports(t) { ok("yes") } else { dim("----") };
        println!(
            "  {:<22} {:<16} {:<16}",
            info.name.white(),
            mark(TaskType::Classification),
            mark(TaskType::Regression)
        );
    }
    println!();
    Ok(())
}

pub fn cmd_metrics() -> anyhow::Result<()> {
    section("Metrics");
    for task in [TaskType::Classification, TaskType::Regression] {
        println!("  {:<16} {}", muted(task.as_str()), supported_metrics(task).join(", "));
    }
    println!();
    Ok(())
}

pub fn cmd_info() -> anyhow::Result<()> {
    println!();
    line_box_top();
    line_box_empty();
    line_box_center(&format!("{}", "Kolosal Pipeline".white().bold()));
    line_box_center(&format!("{}", dim(&format!("v{}", env!("CARGO_PKG_VERSION")))));
    line_box_empty();
    line_box_sep();
    line_box_empty();
    line_box(&kv("description ", "machine learning pipelines from a config file"));
    line_box(&kv("formats     ", "csv, json, parquet"));
    line_box(&kv("algorithms  ", &CATALOG.len().to_string()));
    line_box(&kv("license     ", env!("CARGO_PKG_LICENSE")));
    line_box_empty();
    line_box_bottom();
    println!();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_task() {
        assert_eq!(parse_task("Classification").unwrap(), TaskType::Classification);
        assert!(parse_task("clustering").is_err());
    }

    #[test]
    fn test_cli_parses_fit() {
        let cli = Cli::try_parse_from(["kolosal-pipeline", "fit", "-d", "train.csv", "-c", "igel.yaml", "--seed", "7"])
            .unwrap();
        match cli.command {
            Commands::Fit { data, output, seed, .. } => {
                assert_eq!(data, PathBuf::from("train.csv"));
                assert_eq!(output, PathBuf::from("model_results"));
                assert_eq!(seed, Some(7));
            }
            _ => panic!("expected fit"),
        }
    }

    #[test]
    fn test_strip_ansi() {
        assert_eq!(strip_ansi("\x1b[1mbold\x1b[0m"), "bold");
    }
}
