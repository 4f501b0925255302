//! Exhaustive hyperparameter search scored by k-fold R².

use crate::config::{ForestConfig, MaxFeatures};
use crate::cross_validation::cross_val_r2;
use crate::forest::RandomForestRegressor;
use crate::metrics::RegressionMetrics;
use crate::split::train_test_split;
use crate::{check_training_data, gather, Result, TrainingError};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Values to try for each hyperparameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamGrid {
    pub n_estimators: Vec<usize>,
    pub max_depth: Vec<Option<usize>>,
    pub min_samples_split: Vec<usize>,
    pub min_samples_leaf: Vec<usize>,
    pub max_features: Vec<MaxFeatures>,
}

impl Default for ParamGrid {
    fn default() -> Self {
        Self {
            n_estimators: vec![100, 200, 300],
            max_depth: vec![Some(10), Some(20), None],
            min_samples_split: vec![2, 5, 10],
            min_samples_leaf: vec![1, 2, 4],
            max_features: vec![MaxFeatures::All, MaxFeatures::Sqrt, MaxFeatures::Log2],
        }
    }
}

impl ParamGrid {
    /// A small grid for smoke runs.
    pub fn quick() -> Self {
        Self {
            n_estimators: vec![50, 100],
            max_depth: vec![Some(10), None],
            min_samples_split: vec![2],
            min_samples_leaf: vec![1, 2],
            max_features: vec![MaxFeatures::All, MaxFeatures::Sqrt],
        }
    }

    /// Number of candidate configurations.
    pub fn len(&self) -> usize {
        self.n_estimators.len()
            * self.max_depth.len()
            * self.min_samples_split.len()
            * self.min_samples_leaf.len()
            * self.max_features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every combination, last field varying fastest.
    pub fn candidates(&self) -> Vec<ForestConfig> {
        let mut out = Vec::with_capacity(self.len());
        for &n in &self.n_estimators {
            for &depth in &self.max_depth {
                for &split in &self.min_samples_split {
                    for &leaf in &self.min_samples_leaf {
                        for &features in &self.max_features {
                            out.push(
                                ForestConfig::default()
                                    .with_n_estimators(n)
                                    .with_max_depth(depth)
                                    .with_min_samples_split(split)
                                    .with_min_samples_leaf(leaf)
                                    .with_max_features(features),
                            );
                        }
                    }
                }
            }
        }
        out
    }
}

/// Cross-validated score of one candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateScore {
    pub config: ForestConfig,
    pub mean_r2: f64,
    pub std_r2: f64,
}

/// Result of a grid search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TuningReport {
    pub folds: usize,
    pub best: ForestConfig,
    pub best_score: f64,
    /// Best configuration refit on a train split and scored on the held-out
    /// rows (same 80/20 split the training run uses).
    pub holdout: RegressionMetrics,
    /// Every candidate, in grid order.
    pub candidates: Vec<CandidateScore>,
}

/// Scores every candidate of `grid` by mean k-fold R² and keeps the first
/// best one.
pub fn tune(
    rows: &[Vec<f64>],
    target: &[f64],
    grid: &ParamGrid,
    folds: usize,
    seed: u64,
) -> Result<TuningReport> {
    check_training_data(rows, target)?;
    let configs = grid.candidates();
    if configs.is_empty() {
        return Err(TrainingError::InvalidConfig("parameter grid is empty".to_string()));
    }
    info!(candidates = configs.len(), folds, rows = rows.len(), "Starting grid search");

    let mut candidates: Vec<CandidateScore> = Vec::with_capacity(configs.len());
    let mut best: Option<usize> = None;
    for (i, config) in configs.into_iter().enumerate() {
        config.validate()?;
        let scores = cross_val_r2(rows, target, &config, folds, seed)?;
        debug!(candidate = i, mean_r2 = scores.mean, "Candidate scored");
        if best.map_or(true, |b: usize| scores.mean > candidates[b].mean_r2) {
            best = Some(i);
        }
        candidates.push(CandidateScore {
            config,
            mean_r2: scores.mean,
            std_r2: scores.std,
        });
    }
    let best = best.map(|b: usize| candidates[b].clone()).ok_or_else(|| {
        TrainingError::InvalidConfig("parameter grid is empty".to_string())
    })?;

    let split = train_test_split(rows.len(), 0.2, seed)?;
    let forest = RandomForestRegressor::fit(
        &gather(rows, &split.train),
        &gather(target, &split.train),
        &best.config,
        seed,
    )?;
    let holdout = RegressionMetrics::compute(
        &gather(target, &split.test),
        &forest.predict(&gather(rows, &split.test))?,
    )?;
    info!(
        best_r2 = best.mean_r2,
        holdout_r2 = holdout.r2,
        n_estimators = best.config.n_estimators,
        "Grid search complete"
    );

    Ok(TuningReport {
        folds,
        best: best.config,
        best_score: best.mean_r2,
        holdout,
        candidates,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_grid_size() {
        let grid = ParamGrid::default();
        assert_eq!(grid.len(), 243);
        assert_eq!(grid.candidates().len(), 243);
        assert_eq!(grid.candidates()[0].n_estimators, 100);
        assert_eq!(grid.candidates()[1].tree.max_features, MaxFeatures::Sqrt);
    }

    #[test]
    fn test_tune_picks_best_and_keeps_all() {
        let rows: Vec<Vec<f64>> = (0..30).map(|i| vec![(i % 10) as f64]).collect();
        let target: Vec<f64> = (0..30).map(|i| ((i % 10) * 5) as f64).collect();
        let grid = ParamGrid {
            n_estimators: vec![5],
            max_depth: vec![Some(1), None],
            min_samples_split: vec![2],
            min_samples_leaf: vec![1],
            max_features: vec![MaxFeatures::All],
        };
        let report = tune(&rows, &target, &grid, 3, 42).unwrap();
        assert_eq!(report.candidates.len(), 2);
        assert_eq!(report.best.tree.max_depth, None);
        assert!(report.best_score >= report.candidates[0].mean_r2);
    }

    #[test]
    fn test_empty_grid_is_rejected() {
        let grid = ParamGrid {
            n_estimators: vec![],
            ..ParamGrid::quick()
        };
        let err = tune(&[vec![1.0]], &[1.0], &grid, 3, 0).unwrap_err();
        assert!(matches!(err, TrainingError::InvalidConfig(_)));
    }
}
