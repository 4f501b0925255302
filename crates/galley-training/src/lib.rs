//! Random forest regression for catering demand.
//!
//! This crate turns a numeric feature table into a fitted
//! [`RandomForestRegressor`] and reports how well it generalizes:
//!
//! ```text
//! FeatureTable + target
//!        │
//!        ▼
//!  train_test_split ──► fit forest on train ──► metrics on train / test
//!        │
//!        └──────────► k-fold cross-validated R² on the full table
//! ```
//!
//! Everything is deterministic for a given seed: trees are grown in
//! parallel with [`rayon`], but each tree draws from its own RNG seeded
//! up front, so scheduling never changes the result.

pub mod config;
pub mod cross_validation;
pub mod forest;
pub mod metrics;
pub mod split;
pub mod trainer;
pub mod tree;
pub mod tuning;

pub use config::{ForestConfig, MaxFeatures, TrainConfig, TreeConfig};
pub use cross_validation::cross_val_r2;
pub use forest::RandomForestRegressor;
pub use metrics::{mean_absolute_error, mean_squared_error, r2_score, CvScores, RegressionMetrics};
pub use split::{k_fold, train_test_split, Fold, TrainTestSplit};
pub use trainer::{train, train_corpus, FeatureImportance, TrainedModel, TrainingOutcome, TrainingReport};
pub use tree::{DecisionTreeRegressor, Node};
pub use tuning::{tune, CandidateScore, ParamGrid, TuningReport};

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while fitting or evaluating a model.
#[derive(Debug, Error)]
pub enum TrainingError {
    /// There are no rows to fit on.
    #[error("Cannot train on an empty dataset")]
    EmptyDataset,

    /// Feature rows and targets disagree in length, or rows disagree in width.
    #[error("Shape mismatch: {0}")]
    ShapeMismatch(String),

    /// A feature or target value is NaN or infinite.
    #[error("Non-finite value in {column} at row {row}")]
    NonFinite { row: usize, column: String },

    /// A configuration value is out of range.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A config file could not be read or parsed.
    #[error("Failed to read config {path}: {reason}")]
    ConfigFile { path: PathBuf, reason: String },

    /// Not enough rows for the requested split or fold count.
    #[error("{purpose} needs at least {required} rows, got {rows}")]
    TooFewRows {
        rows: usize,
        required: usize,
        purpose: &'static str,
    },
}

/// Result type for training operations.
pub type Result<T> = std::result::Result<T, TrainingError>;

/// Checks that `rows` and `target` form a usable training set and returns
/// the feature width.
pub(crate) fn check_training_data(rows: &[Vec<f64>], target: &[f64]) -> Result<usize> {
    if rows.is_empty() {
        return Err(TrainingError::EmptyDataset);
    }
    if rows.len() != target.len() {
        return Err(TrainingError::ShapeMismatch(format!(
            "{} feature rows but {} targets",
            rows.len(),
            target.len()
        )));
    }
    let width = rows[0].len();
    if width == 0 {
        return Err(TrainingError::ShapeMismatch("rows have no features".to_string()));
    }
    for (i, row) in rows.iter().enumerate() {
        if row.len() != width {
            return Err(TrainingError::ShapeMismatch(format!(
                "row {i} has {} features, expected {width}",
                row.len()
            )));
        }
        if let Some(col) = row.iter().position(|v| !v.is_finite()) {
            return Err(TrainingError::NonFinite {
                row: i,
                column: format!("feature {col}"),
            });
        }
        if !target[i].is_finite() {
            return Err(TrainingError::NonFinite {
                row: i,
                column: "target".to_string(),
            });
        }
    }
    Ok(width)
}

/// Copies the rows at `indices`, in order.
pub(crate) fn gather<T: Clone>(values: &[T], indices: &[usize]) -> Vec<T> {
    indices.iter().map(|&i| values[i].clone()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_training_data() {
        assert!(matches!(
            check_training_data(&[], &[]),
            Err(TrainingError::EmptyDataset)
        ));
        assert!(matches!(
            check_training_data(&[vec![1.0]], &[1.0, 2.0]),
            Err(TrainingError::ShapeMismatch(_))
        ));
        assert!(matches!(
            check_training_data(&[vec![1.0, 2.0], vec![1.0]], &[1.0, 2.0]),
            Err(TrainingError::ShapeMismatch(_))
        ));
        assert!(matches!(
            check_training_data(&[vec![1.0], vec![f64::NAN]], &[1.0, 2.0]),
            Err(TrainingError::NonFinite { row: 1, .. })
        ));
        assert!(matches!(
            check_training_data(&[vec![1.0]], &[f64::INFINITY]),
            Err(TrainingError::NonFinite { row: 0, .. })
        ));
        assert_eq!(check_training_data(&[vec![1.0, 2.0]], &[3.0]).unwrap(), 2);
    }

    #[test]
    fn test_error_display() {
        let err = TrainingError::TooFewRows {
            rows: 3,
            required: 5,
            purpose: "5-fold cross-validation",
        };
        assert_eq!(
            err.to_string(),
            "5-fold cross-validation needs at least 5 rows, got 3"
        );
    }
}
