//! End-to-end training run: split, fit, evaluate.

use crate::config::{ForestConfig, TrainConfig};
use crate::cross_validation::cross_val_r2;
use crate::forest::RandomForestRegressor;
use crate::metrics::{CvScores, RegressionMetrics};
use crate::split::train_test_split;
use crate::{check_training_data, gather, Result, TrainingError};
use galley_data::{CategoryEncoders, FeatureTable, PreprocessStats, PreprocessedCorpus};
use serde::{Deserialize, Serialize};
use tracing::info;

/// A fitted forest together with everything needed to build its inputs.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainedModel {
    pub forest: RandomForestRegressor,
    pub encoders: CategoryEncoders,
    /// Feature columns in the order the forest expects them.
    pub feature_names: Vec<String>,
}

impl TrainedModel {
    /// Raw forest output for an already encoded feature row.
    pub fn predict_features(&self, row: &[f64]) -> Result<f64> {
        self.forest.predict_row(row)
    }
}

/// Importance of one feature column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureImportance {
    pub feature: String,
    pub importance: f64,
}

/// Metrics and bookkeeping from one training run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingReport {
    pub n_rows: usize,
    pub n_train: usize,
    pub n_test: usize,
    pub seed: u64,
    pub test_fraction: f64,
    pub forest: ForestConfig,
    pub train: RegressionMetrics,
    pub test: RegressionMetrics,
    /// `None` when cross-validation was disabled.
    pub cross_validation: Option<CvScores>,
    /// Sorted by importance, highest first.
    pub feature_importances: Vec<FeatureImportance>,
    /// Mean consumed / standard stocked ratio of the training corpus.
    pub mean_utilization: Option<f64>,
    pub preprocessing: Option<PreprocessStats>,
}

/// Model and report produced by [`train_corpus`].
#[derive(Debug, Clone)]
pub struct TrainingOutcome {
    pub model: TrainedModel,
    pub report: TrainingReport,
}

/// Splits `features` / `target`, fits a forest on the training rows and
/// evaluates it on both partitions plus k-fold CV over the whole table.
pub fn train(
    features: &FeatureTable,
    target: &[f64],
    config: &TrainConfig,
) -> Result<(RandomForestRegressor, TrainingReport)> {
    config.validate()?;
    let rows = features.rows();
    check_training_data(rows, target)?;
    if features.n_features() != rows[0].len() {
        return Err(TrainingError::ShapeMismatch(format!(
            "{} column names for {} features",
            features.n_features(),
            rows[0].len()
        )));
    }

    let split = train_test_split(rows.len(), config.test_fraction, config.seed)?;
    info!(
        rows = rows.len(),
        train = split.train.len(),
        test = split.test.len(),
        seed = config.seed,
        "Starting training run"
    );

    let x_train = gather(rows, &split.train);
    let y_train = gather(target, &split.train);
    let x_test = gather(rows, &split.test);
    let y_test = gather(target, &split.test);

    let forest = RandomForestRegressor::fit(&x_train, &y_train, &config.forest, config.seed)?;
    let train_metrics = RegressionMetrics::compute(&y_train, &forest.predict(&x_train)?)?;
    let test_metrics = RegressionMetrics::compute(&y_test, &forest.predict(&x_test)?)?;
    info!(
        train_r2 = train_metrics.r2,
        test_r2 = test_metrics.r2,
        test_rmse = test_metrics.rmse,
        test_mae = test_metrics.mae,
        "Evaluation complete"
    );

    let cross_validation = if config.cv_folds >= 2 {
        let scores = cross_val_r2(rows, target, &config.forest, config.cv_folds, config.seed)?;
        info!(
            folds = config.cv_folds,
            mean_r2 = scores.mean,
            std_r2 = scores.std,
            "Cross-validation complete"
        );
        Some(scores)
    } else {
        None
    };

    let mut feature_importances: Vec<FeatureImportance> = features
        .columns()
        .iter()
        .zip(forest.feature_importances())
        .map(|(name, importance)| FeatureImportance {
            feature: name.clone(),
            importance,
        })
        .collect();
    feature_importances.sort_by(|a, b| b.importance.total_cmp(&a.importance));

    let report = TrainingReport {
        n_rows: rows.len(),
        n_train: split.train.len(),
        n_test: split.test.len(),
        seed: config.seed,
        test_fraction: config.test_fraction,
        forest: config.forest.clone(),
        train: train_metrics,
        test: test_metrics,
        cross_validation,
        feature_importances,
        mean_utilization: None,
        preprocessing: None,
    };
    Ok((forest, report))
}

/// Trains on a preprocessed corpus and bundles the result with its encoders.
pub fn train_corpus(prepared: &PreprocessedCorpus, config: &TrainConfig) -> Result<TrainingOutcome> {
    let (forest, mut report) = train(&prepared.features, &prepared.target, config)?;
    report.mean_utilization = prepared.mean_utilization();
    report.preprocessing = Some(prepared.stats);

    let model = TrainedModel {
        forest,
        encoders: prepared.encoders.clone(),
        feature_names: prepared.features.columns().to_vec(),
    };
    Ok(TrainingOutcome { model, report })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(n: usize) -> (FeatureTable, Vec<f64>) {
        let mut features = FeatureTable::new(["a", "b"]);
        let mut target = Vec::new();
        for i in 0..n {
            features.push_row(vec![i as f64, (i % 2) as f64]);
            target.push(3.0 * i as f64 + 1.0);
        }
        (features, target)
    }

    fn small_config() -> TrainConfig {
        TrainConfig::default().with_forest(ForestConfig::default().with_n_estimators(10))
    }

    #[test]
    fn test_report_partition_sizes() {
        let (features, target) = table(30);
        let (forest, report) = train(&features, &target, &small_config()).unwrap();
        assert_eq!(forest.n_features(), 2);
        assert_eq!(report.n_rows, 30);
        assert_eq!(report.n_test, 6);
        assert_eq!(report.n_train, 24);
        assert_eq!(report.train.samples, 24);
        assert_eq!(report.test.samples, 6);
        assert_eq!(report.cross_validation.as_ref().unwrap().folds.len(), 5);
        assert!(report.train.r2 > 0.9);
    }

    #[test]
    fn test_importances_sorted_and_named() {
        let (features, target) = table(30);
        let (_, report) = train(&features, &target, &small_config()).unwrap();
        assert_eq!(report.feature_importances.len(), 2);
        assert_eq!(report.feature_importances[0].feature, "a");
        assert!(report.feature_importances[0].importance >= report.feature_importances[1].importance);
        let total: f64 = report.feature_importances.iter().map(|f| f.importance).sum();
        assert!((total - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_cv_can_be_disabled() {
        let (features, target) = table(12);
        let config = small_config().with_cv_folds(0);
        let (_, report) = train(&features, &target, &config).unwrap();
        assert!(report.cross_validation.is_none());
    }

    #[test]
    fn test_fewer_rows_than_folds_fails() {
        let (features, target) = table(4);
        let err = train(&features, &target, &small_config()).unwrap_err();
        assert!(matches!(err, TrainingError::TooFewRows { .. }), "unexpected error: {err:?}");
    }

    #[test]
    fn test_same_seed_same_report() {
        let (features, target) = table(20);
        let (fa, ra) = train(&features, &target, &small_config()).unwrap();
        let (fb, rb) = train(&features, &target, &small_config()).unwrap();
        assert_eq!(fa, fb);
        assert_eq!(ra, rb);
    }
}
