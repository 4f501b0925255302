//! Row partitioning for hold-out evaluation and k-fold cross-validation.

use crate::{Result, TrainingError};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

/// Disjoint train/test row indices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainTestSplit {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// Shuffles `0..n_rows` with `seed` and holds out `ceil(test_fraction * n)`
/// rows for testing.
///
/// # Errors
///
/// [`TrainingError::InvalidConfig`] when the fraction is outside (0, 1) and
/// [`TrainingError::TooFewRows`] when either side would be empty.
pub fn train_test_split(n_rows: usize, test_fraction: f64, seed: u64) -> Result<TrainTestSplit> {
    if !(test_fraction > 0.0 && test_fraction < 1.0) {
        return Err(TrainingError::InvalidConfig(format!(
            "test_fraction must be in (0, 1), got {test_fraction}"
        )));
    }
    let n_test = (test_fraction * n_rows as f64).ceil() as usize;
    if n_test == 0 || n_test >= n_rows {
        return Err(TrainingError::TooFewRows {
            rows: n_rows,
            required: 2,
            purpose: "train/test split",
        });
    }

    let mut order: Vec<usize> = (0..n_rows).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    order.shuffle(&mut rng);
    let train = order.split_off(n_test);
    Ok(TrainTestSplit { train, test: order })
}

/// One cross-validation fold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fold {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// Splits `0..n_rows` into `k` contiguous, unshuffled folds. The first
/// `n_rows % k` folds hold one extra row.
pub fn k_fold(n_rows: usize, k: usize) -> Result<Vec<Fold>> {
    if k < 2 {
        return Err(TrainingError::InvalidConfig(format!(
            "cross-validation needs at least 2 folds, got {k}"
        )));
    }
    if n_rows < k {
        return Err(TrainingError::TooFewRows {
            rows: n_rows,
            required: k,
            purpose: "k-fold cross-validation",
        });
    }

    let base = n_rows / k;
    let extra = n_rows % k;
    let mut folds = Vec::with_capacity(k);
    let mut start = 0;
    for fold in 0..k {
        let size = base + usize::from(fold < extra);
        let end = start + size;
        folds.push(Fold {
            train: (0..start).chain(end..n_rows).collect(),
            test: (start..end).collect(),
        });
        start = end;
    }
    Ok(folds)
}
