//! Train/test splitting

use crate::descriptor::SplitSpec;
use crate::error::{PipelineError, Result};
use polars::prelude::*;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::collections::BTreeMap;

/// Training and test partitions of a dataset
#[derive(Debug, Clone)]
pub struct TrainTestSplit {
    pub train: DataFrame,
    pub test: DataFrame,
}

/// Split `df` into train and test rows.
///
/// `ceil(n * test_size)` rows go to the test set. Without shuffling the last
/// rows form the test set. With shuffling rows are permuted by a ChaCha RNG
/// seeded from `seed`, or from entropy when no seed is supplied. When
/// `stratify_by` names a column the proportions of its values are kept in
/// both partitions.
pub fn train_test_split(
    df: &DataFrame,
    split: &SplitSpec,
    stratify_by: Option<&str>,
    seed: Option<u64>,
) -> Result<TrainTestSplit> {
    let n_rows = df.height();
    let mut rng = match seed {
        Some(seed) => ChaCha8Rng::seed_from_u64(seed),
        None => ChaCha8Rng::from_entropy(),
    };

    let (train_idx, test_idx) = match stratify_by {
        Some(column) => stratified_indices(df, column, split.n_test(n_rows), &mut rng)?,
        None => {
            let n_test = split.n_test(n_rows);
            let mut indices: Vec<usize> = (0..n_rows).collect();
            if split.shuffle {
                indices.shuffle(&mut rng);
            }
            let n_train = n_rows.saturating_sub(n_test);
            let test = indices.split_off(n_train);
            (indices, test)
        }
    };

    if train_idx.is_empty() || test_idx.is_empty() {
        return Err(PipelineError::Dataset(format!(
            "test_size {} leaves an empty partition for {} rows ({} train, {} test)",
            split.test_size,
            n_rows,
            train_idx.len(),
            test_idx.len()
        )));
    }

    Ok(TrainTestSplit {
        train: take_rows(df, &train_idx)?,
        test: take_rows(df, &test_idx)?,
    })
}

/// Class-wise split holding out `n_test` rows in total.
///
/// Each class gets the floor of its proportional share; the rows left over go
/// to the classes with the largest remainders, earlier classes first on ties.
fn stratified_indices(
    df: &DataFrame,
    column: &str,
    n_test: usize,
    rng: &mut ChaCha8Rng,
) -> Result<(Vec<usize>, Vec<usize>)> {
    let labels = df
        .column(column)
        .map_err(|_| PipelineError::Dataset(format!("stratify column `{}` not found", column)))?
        .cast(&DataType::String)?;
    let labels = labels.as_materialized_series().str()?;

    // BTreeMap keeps class order, and so the RNG stream, deterministic
    let mut by_class: BTreeMap<String, Vec<usize>> = BTreeMap::new();
    for (idx, label) in labels.into_iter().enumerate() {
        let key = label.unwrap_or("<null>").to_string();
        by_class.entry(key).or_default().push(idx);
    }

    let n_rows = df.height().max(1);
    let mut quotas: Vec<usize> = by_class
        .values()
        .map(|indices| indices.len() * n_test / n_rows)
        .collect();
    let mut by_remainder: Vec<(usize, usize)> = by_class
        .values()
        .enumerate()
        .map(|(i, indices)| (i, indices.len() * n_test % n_rows))
        .collect();
    by_remainder.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
    let leftover = n_test.saturating_sub(quotas.iter().sum());
    for &(class, _) in by_remainder.iter().take(leftover) {
        quotas[class] += 1;
    }

    let mut train = Vec::new();
    let mut test = Vec::new();
    for (mut indices, quota) in by_class.into_values().zip(quotas) {
        indices.shuffle(rng);
        let n_train = indices.len() - quota.min(indices.len());
        test.extend_from_slice(&indices[n_train..]);
        train.extend_from_slice(&indices[..n_train]);
    }
    train.shuffle(rng);
    test.shuffle(rng);

    Ok((train, test))
}

/// Select rows by position
pub fn take_rows(df: &DataFrame, indices: &[usize]) -> Result<DataFrame> {
    let idx = IdxCa::from_vec(
        "idx".into(),
        indices.iter().map(|&i| i as IdxSize).collect(),
    );
    Ok(df.take(&idx)?)
}
