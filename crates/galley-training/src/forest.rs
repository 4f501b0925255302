//! Bagged ensemble of regression trees.

use crate::config::ForestConfig;
use crate::tree::DecisionTreeRegressor;
use crate::{check_training_data, Result, TrainingError};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Random forest regressor.
///
/// Each tree is fit on a bootstrap resample of the rows and the prediction
/// is the mean of the tree predictions.
///
/// # Examples
///
/// ```
/// use galley_training::{ForestConfig, RandomForestRegressor};
///
/// let rows: Vec<Vec<f64>> = (0..20).map(|i| vec![i as f64]).collect();
/// let target: Vec<f64> = (0..20).map(|i| 2.0 * i as f64).collect();
/// let config = ForestConfig::default().with_n_estimators(10);
///
/// let forest = RandomForestRegressor::fit(&rows, &target, &config, 42).unwrap();
/// assert_eq!(forest.n_trees(), 10);
/// let y = forest.predict_row(&[10.0]).unwrap();
/// assert!(y > 10.0 && y < 30.0);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForestRegressor {
    config: ForestConfig,
    seed: u64,
    n_features: usize,
    trees: Vec<DecisionTreeRegressor>,
}

impl RandomForestRegressor {
    /// Fits a forest on `rows` / `target`.
    ///
    /// Per-tree seeds are drawn from `seed` before any tree is grown, so the
    /// result does not depend on how rayon schedules the work.
    pub fn fit(rows: &[Vec<f64>], target: &[f64], config: &ForestConfig, seed: u64) -> Result<Self> {
        config.validate()?;
        let n_features = check_training_data(rows, target)?;
        let n_rows = rows.len();

        let mut master = StdRng::seed_from_u64(seed);
        let tree_seeds: Vec<u64> = (0..config.n_estimators).map(|_| master.gen()).collect();

        info!(
            trees = config.n_estimators,
            rows = n_rows,
            features = n_features,
            seed,
            "Fitting random forest"
        );

        let trees: Vec<DecisionTreeRegressor> = tree_seeds
            .par_iter()
            .enumerate()
            .map(|(i, &tree_seed)| {
                let mut rng = StdRng::seed_from_u64(tree_seed);
                let sample: Vec<usize> = if config.bootstrap {
                    (0..n_rows).map(|_| rng.gen_range(0..n_rows)).collect()
                } else {
                    (0..n_rows).collect()
                };
                let tree = DecisionTreeRegressor::fit(rows, target, &sample, &config.tree, &mut rng);
                debug!(tree = i, nodes = tree.nodes().len(), depth = tree.depth(), "Tree grown");
                tree
            })
            .collect();

        Ok(Self {
            config: config.clone(),
            seed,
            n_features,
            trees,
        })
    }

    /// Predicts one row.
    ///
    /// # Errors
    ///
    /// [`TrainingError::ShapeMismatch`] if the row width differs from the
    /// training width, [`TrainingError::NonFinite`] for NaN or infinite input.
    pub fn predict_row(&self, row: &[f64]) -> Result<f64> {
        if row.len() != self.n_features {
            return Err(TrainingError::ShapeMismatch(format!(
                "expected {} features, got {}",
                self.n_features,
                row.len()
            )));
        }
        if let Some(col) = row.iter().position(|v| !v.is_finite()) {
            return Err(TrainingError::NonFinite {
                row: 0,
                column: format!("feature {col}"),
            });
        }
        if self.trees.is_empty() {
            return Err(TrainingError::InvalidConfig("forest has no trees".to_string()));
        }
        let sum: f64 = self.trees.iter().map(|t| t.predict_row(row)).sum();
        Ok(sum / self.trees.len() as f64)
    }

    /// Predicts every row.
    pub fn predict(&self, rows: &[Vec<f64>]) -> Result<Vec<f64>> {
        rows.iter()
            .enumerate()
            .map(|(i, row)| {
                self.predict_row(row).map_err(|e| match e {
                    TrainingError::NonFinite { column, .. } => TrainingError::NonFinite { row: i, column },
                    other => other,
                })
            })
            .collect()
    }

    /// Mean of the per-tree normalized importances, renormalized to sum to 1.
    pub fn feature_importances(&self) -> Vec<f64> {
        let mut sum = vec![0.0; self.n_features];
        for tree in &self.trees {
            for (acc, v) in sum.iter_mut().zip(tree.feature_importances()) {
                *acc += v;
            }
        }
        let total: f64 = sum.iter().sum();
        if total > 0.0 {
            sum.iter().map(|v| v / total).collect()
        } else {
            sum
        }
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn trees(&self) -> &[DecisionTreeRegressor] {
        &self.trees
    }

    pub fn config(&self) -> &ForestConfig {
        &self.config
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Structural check used after loading a persisted forest.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.trees.is_empty() {
            return Err("forest has no trees".to_string());
        }
        for (i, tree) in self.trees.iter().enumerate() {
            if tree.n_features() != self.n_features {
                return Err(format!(
                    "tree {i} expects {} features, forest expects {}",
                    tree.n_features(),
                    self.n_features
                ));
            }
            tree.validate().map_err(|e| format!("tree {i}: {e}"))?;
        }
        Ok(())
    }
}
