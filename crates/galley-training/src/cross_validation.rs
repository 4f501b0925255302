//! K-fold cross-validated R².

use crate::config::ForestConfig;
use crate::forest::RandomForestRegressor;
use crate::metrics::{r2_score, CvScores};
use crate::split::k_fold;
use crate::{check_training_data, gather, Result};
use tracing::debug;

/// Fits one forest per fold (each with the same `seed`) and scores it on the
/// held-out fold.
///
/// Folds are contiguous and unshuffled, so row order matters.
pub fn cross_val_r2(
    rows: &[Vec<f64>],
    target: &[f64],
    config: &ForestConfig,
    folds: usize,
    seed: u64,
) -> Result<CvScores> {
    check_training_data(rows, target)?;
    let layout = k_fold(rows.len(), folds)?;

    let mut scores = Vec::with_capacity(layout.len());
    for (i, fold) in layout.iter().enumerate() {
        let forest = RandomForestRegressor::fit(
            &gather(rows, &fold.train),
            &gather(target, &fold.train),
            config,
            seed,
        )?;
        let predicted = forest.predict(&gather(rows, &fold.test))?;
        let score = r2_score(&gather(target, &fold.test), &predicted)?;
        debug!(fold = i, r2 = score, "Cross-validation fold scored");
        scores.push(score);
    }
    Ok(CvScores::from_scores(scores))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TrainingError;

    #[test]
    fn test_one_score_per_fold() {
        let rows: Vec<Vec<f64>> = (0..25).map(|i| vec![(i % 5) as f64]).collect();
        let target: Vec<f64> = (0..25).map(|i| (i % 5) as f64 * 10.0).collect();
        let config = ForestConfig::default()
            .with_n_estimators(5)
            .with_bootstrap(false);
        let scores = cross_val_r2(&rows, &target, &config, 5, 42).unwrap();
        assert_eq!(scores.folds.len(), 5);
        for s in &scores.folds {
            assert!((s - 1.0).abs() < 1e-9, "fold score {s}");
        }
        assert!(scores.std < 1e-9);
    }

    #[test]
    fn test_too_few_rows_for_folds() {
        let rows = vec![vec![1.0], vec![2.0]];
        let config = ForestConfig::default().with_n_estimators(2);
        let err = cross_val_r2(&rows, &[1.0, 2.0], &config, 5, 0).unwrap_err();
        assert!(matches!(err, TrainingError::TooFewRows { .. }));
    }
}
