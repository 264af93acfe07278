//! Hyperparameter search collaborator
//!
//! Grid search scores every combination of `parameter_grid`; random search
//! scores `n_iter` distinct combinations drawn from it. Each candidate is
//! scored by k-fold cross validation on the training split (stratified for
//! classification) and candidates are evaluated in parallel.

use crate::descriptor::{ParamValue, Params, SearchMethod, SearchSpec, TaskType};
use crate::error::Result;
use crate::training::{metrics, CVSplit, CVStrategy, CrossValidator, Estimator, ModelFactory};
use ndarray::{Array1, Array2, Axis};
use rand::seq::index::sample;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, info};

/// Cross-validated result of one candidate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateResult {
    pub candidate_id: usize,
    /// Grid values of this candidate (base arguments not included)
    pub params: Params,
    pub mean_test_score: f64,
    pub std_test_score: f64,
    pub fold_test_scores: Vec<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mean_train_score: Option<f64>,
    pub duration_secs: f64,
}

/// Outcome of a search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchReport {
    pub method: SearchMethod,
    /// Folds per candidate
    pub cv: usize,
    /// Accuracy for classification, R2 for regression
    pub scoring: String,
    pub candidates: Vec<CandidateResult>,
    pub best_index: usize,
    /// Base arguments merged with the winning grid values
    pub best_params: Params,
    pub best_score: f64,
    /// Whether the best candidate was refitted on the full training split
    pub refit: bool,
}

impl SearchReport {
    pub fn best(&self) -> &CandidateResult {
        &self.candidates[self.best_index]
    }
}

/// Hyperparameter search over one algorithm
pub struct HyperparameterSearch<'a, F: ModelFactory> {
    factory: &'a F,
    task: TaskType,
    algorithm: &'a str,
    base_params: &'a Params,
    spec: &'a SearchSpec,
    seed: Option<u64>,
}

impl<'a, F: ModelFactory> HyperparameterSearch<'a, F> {
    pub fn new(
        factory: &'a F,
        task: TaskType,
        algorithm: &'a str,
        base_params: &'a Params,
        spec: &'a SearchSpec,
    ) -> Self {
        Self {
            factory,
            task,
            algorithm,
            base_params,
            spec,
            seed: None,
        }
    }

    /// Seed for candidate sampling and model randomness
    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    /// Candidate grid values, in evaluation order
    pub fn candidates(&self) -> Vec<Params> {
        let grid: Vec<(&String, &Vec<ParamValue>)> = self.spec.parameter_grid.iter().collect();
        let total = grid
            .iter()
            .fold(1usize, |acc, (_, values)| acc.saturating_mul(values.len()));

        let indices: Vec<usize> = match self.spec.method {
            SearchMethod::GridSearch => (0..total).collect(),
            SearchMethod::RandomSearch if self.spec.arguments.n_iter >= total => (0..total).collect(),
            SearchMethod::RandomSearch => {
                let mut rng = match self.seed {
                    Some(seed) => ChaCha8Rng::seed_from_u64(seed),
                    None => ChaCha8Rng::from_entropy(),
                };
                let mut picked = sample(&mut rng, total, self.spec.arguments.n_iter).into_vec();
                picked.sort_unstable();
                picked
            }
        };

        // mixed-radix decode; the last key varies fastest
        indices
            .into_iter()
            .map(|mut index| {
                let mut params = Params::new();
                for (name, values) in grid.iter().rev() {
                    params.insert((*name).clone(), values[index % values.len()].clone());
                    index /= values.len();
                }
                params
            })
            .collect()
    }

    fn merged(&self, candidate: &Params) -> Params {
        let mut params = self.base_params.clone();
        params.extend(candidate.iter().map(|(k, v)| (k.clone(), v.clone())));
        params
    }

    /// Score every candidate on `x`/`y`; returns the report and, with
    /// `refit: true`, the best candidate fitted on all of `x`/`y`
    pub fn run(&self, x: &Array2<f64>, y: &Array1<f64>) -> Result<(SearchReport, Option<F::Model>)> {
        let start = Instant::now();
        let args = &self.spec.arguments;
        let candidates = self.candidates();

        // reject unbuildable candidates before spending time on folds
        for candidate in &candidates {
            self.factory
                .create(self.task, self.algorithm, &self.merged(candidate), self.seed)?;
        }

        let strategy = if self.task.is_classification() {
            CVStrategy::StratifiedKFold { n_splits: args.cv }
        } else {
            CVStrategy::KFold { n_splits: args.cv }
        };
        let splits = CrossValidator::new(strategy).split(y)?;

        info!(
            method = ?self.spec.method,
            candidates = candidates.len(),
            folds = args.cv,
            "Starting hyperparameter search"
        );

        let results = candidates
            .par_iter()
            .enumerate()
            .map(|(candidate_id, candidate)| self.score_candidate(candidate_id, candidate, x, y, &splits))
            .collect::<Result<Vec<_>>>()?;

        let mut best_index = 0;
        for (i, result) in results.iter().enumerate() {
            let best = results[best_index].mean_test_score;
            if result.mean_test_score > best || (best.is_nan() && !result.mean_test_score.is_nan()) {
                best_index = i;
            }
        }
        let best_params = self.merged(&results[best_index].params);
        let best_score = results[best_index].mean_test_score;

        info!(
            best_score,
            best_params = %format_params(&results[best_index].params),
            elapsed = ?start.elapsed(),
            "Hyperparameter search finished"
        );

        let model = if args.refit {
            let mut model = self.factory.create(self.task, self.algorithm, &best_params, self.seed)?;
            model.fit(x, y)?;
            Some(model)
        } else {
            None
        };

        let report = SearchReport {
            method: self.spec.method,
            cv: args.cv,
            scoring: match self.task {
                TaskType::Classification => "accuracy",
                TaskType::Regression => "r2",
            }
            .to_string(),
            candidates: results,
            best_index,
            best_params,
            best_score,
            refit: args.refit,
        };
        Ok((report, model))
    }

    fn score_candidate(
        &self,
        candidate_id: usize,
        candidate: &Params,
        x: &Array2<f64>,
        y: &Array1<f64>,
        splits: &[CVSplit],
    ) -> Result<CandidateResult> {
        let start = Instant::now();
        let params = self.merged(candidate);
        let mut test_scores = Vec::with_capacity(splits.len());
        let mut train_scores = Vec::new();

        for split in splits {
            let x_train = x.select(Axis(0), &split.train_indices);
            let y_train = y.select(Axis(0), &split.train_indices);
            let x_test = x.select(Axis(0), &split.test_indices);
            let y_test = y.select(Axis(0), &split.test_indices);

            let mut model = self.factory.create(self.task, self.algorithm, &params, self.seed)?;
            model.fit(&x_train, &y_train)?;
            test_scores.push(metrics::score(self.task, &y_test, &model.predict(&x_test)?));
            if self.spec.arguments.return_train_score {
                train_scores.push(metrics::score(self.task, &y_train, &model.predict(&x_train)?));
            }
        }

        let scores = Array1::from_vec(test_scores.clone());
        let result = CandidateResult {
            candidate_id,
            params: candidate.clone(),
            mean_test_score: scores.mean().unwrap_or(f64::NAN),
            std_test_score: scores.std(0.0),
            fold_test_scores: test_scores,
            mean_train_score: (!train_scores.is_empty())
                .then(|| train_scores.iter().sum::<f64>() / train_scores.len() as f64),
            duration_secs: start.elapsed().as_secs_f64(),
        };

        if self.spec.arguments.verbose > 0 {
            info!(
                candidate = candidate_id,
                params = %format_params(candidate),
                mean_test_score = result.mean_test_score,
                mean_train_score = ?result.mean_train_score,
                "Candidate scored"
            );
        } else {
            debug!(candidate = candidate_id, mean_test_score = result.mean_test_score, "Candidate scored");
        }
        Ok(result)
    }
}

/// `name=value` pairs joined by commas
pub fn format_params(params: &Params) -> String {
    params
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join(", ")
}
