//! Regression metrics.
//!
//! This module provides the error measures reported after training
//! (MSE, RMSE, MAE and R²) and a summary type for cross-validation scores.

use crate::{Result, TrainingError};
use serde::{Deserialize, Serialize};

fn check_lengths(actual: &[f64], predicted: &[f64]) -> Result<()> {
    if actual.is_empty() {
        return Err(TrainingError::EmptyDataset);
    }
    if actual.len() != predicted.len() {
        return Err(TrainingError::ShapeMismatch(format!(
            "{} actual values but {} predictions",
            actual.len(),
            predicted.len()
        )));
    }
    Ok(())
}

/// Mean of the squared residuals.
///
/// # Examples
///
/// ```
/// use galley_training::metrics::mean_squared_error;
///
/// let mse = mean_squared_error(&[1.0, 2.0], &[1.0, 4.0]).unwrap();
/// assert_eq!(mse, 2.0);
/// ```
pub fn mean_squared_error(actual: &[f64], predicted: &[f64]) -> Result<f64> {
    check_lengths(actual, predicted)?;
    let sum: f64 = actual
        .iter()
        .zip(predicted)
        .map(|(a, p)| (a - p).powi(2))
        .sum();
    Ok(sum / actual.len() as f64)
}

/// Mean of the absolute residuals.
pub fn mean_absolute_error(actual: &[f64], predicted: &[f64]) -> Result<f64> {
    check_lengths(actual, predicted)?;
    let sum: f64 = actual.iter().zip(predicted).map(|(a, p)| (a - p).abs()).sum();
    Ok(sum / actual.len() as f64)
}

/// Coefficient of determination, `1 - SS_res / SS_tot`.
///
/// When the actual values are constant (`SS_tot == 0`) the score is 1.0 for
/// a perfect prediction and 0.0 otherwise.
///
/// # Examples
///
/// ```
/// use galley_training::metrics::r2_score;
///
/// assert_eq!(r2_score(&[1.0, 2.0, 3.0], &[1.0, 2.0, 3.0]).unwrap(), 1.0);
/// assert_eq!(r2_score(&[1.0, 2.0, 3.0], &[2.0, 2.0, 2.0]).unwrap(), 0.0);
/// ```
pub fn r2_score(actual: &[f64], predicted: &[f64]) -> Result<f64> {
    check_lengths(actual, predicted)?;
    let mean = actual.iter().sum::<f64>() / actual.len() as f64;
    let ss_tot: f64 = actual.iter().map(|a| (a - mean).powi(2)).sum();
    let ss_res: f64 = actual
        .iter()
        .zip(predicted)
        .map(|(a, p)| (a - p).powi(2))
        .sum();
    if ss_tot == 0.0 {
        return Ok(if ss_res == 0.0 { 1.0 } else { 0.0 });
    }
    Ok(1.0 - ss_res / ss_tot)
}

/// Error measures on one partition.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegressionMetrics {
    pub mse: f64,
    pub rmse: f64,
    pub mae: f64,
    pub r2: f64,
    /// Number of rows evaluated.
    pub samples: usize,
}

impl RegressionMetrics {
    /// Computes every metric for one set of predictions.
    pub fn compute(actual: &[f64], predicted: &[f64]) -> Result<Self> {
        let mse = mean_squared_error(actual, predicted)?;
        Ok(Self {
            mse,
            rmse: mse.sqrt(),
            mae: mean_absolute_error(actual, predicted)?,
            r2: r2_score(actual, predicted)?,
            samples: actual.len(),
        })
    }
}

/// Per-fold R² scores and their summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CvScores {
    pub folds: Vec<f64>,
    pub mean: f64,
    /// Population standard deviation across folds.
    pub std: f64,
}

impl CvScores {
    pub fn from_scores(folds: Vec<f64>) -> Self {
        let n = folds.len().max(1) as f64;
        let mean = folds.iter().sum::<f64>() / n;
        let var = folds.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / n;
        Self {
            folds,
            mean,
            std: var.sqrt(),
        }
    }
}
