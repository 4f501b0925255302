//! Train Command Implementation
//!
//! Loads a consumption export, trains a forest and saves the bundle.
//! Settings come from an optional JSON config file, then CLI flags.

use super::{configure_workers, print_json};
use anyhow::{Context, Result};
use clap::Args;
use galley_serving::DemandPredictor;
use galley_training::TrainConfig;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::info;

/// Value of `--max-depth`: a level count, or `none` for unlimited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DepthLimit {
    Unlimited,
    Levels(usize),
}

impl DepthLimit {
    pub fn as_option(self) -> Option<usize> {
        match self {
            Self::Unlimited => None,
            Self::Levels(n) => Some(n),
        }
    }
}

impl FromStr for DepthLimit {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("none") {
            return Ok(Self::Unlimited);
        }
        s.parse::<usize>()
            .map(Self::Levels)
            .map_err(|_| format!("expected a depth or 'none', got '{s}'"))
    }
}

/// Train a model and save it as a bundle
///
/// # Example
///
/// ```bash
/// galley train \
///     --dataset consumption.csv \
///     --model-dir models/latest \
///     --config train.json \
///     --n-estimators 200
/// ```
#[derive(Args, Debug, Clone)]
pub struct TrainCommand {
    /// Consumption export (CSV)
    #[arg(long, env = "GALLEY_DATASET")]
    pub dataset: PathBuf,

    /// Directory to write the model bundle to
    #[arg(long, short = 'd', env = "GALLEY_MODEL_DIR")]
    pub model_dir: PathBuf,

    /// Training configuration file (JSON)
    #[arg(long, short = 'c')]
    pub config: Option<PathBuf>,

    /// Random seed for the split and the forest
    #[arg(long)]
    pub seed: Option<u64>,

    /// Share of rows held out for testing
    #[arg(long)]
    pub test_fraction: Option<f64>,

    /// Number of trees
    #[arg(long)]
    pub n_estimators: Option<usize>,

    /// Maximum tree depth, or `none` to lift a limit set in the config file
    #[arg(long)]
    pub max_depth: Option<DepthLimit>,

    /// Cross-validation folds (0 disables)
    #[arg(long)]
    pub cv_folds: Option<usize>,

    /// Worker threads for tree fitting (0 = number of CPUs)
    #[arg(long, default_value = "0")]
    pub workers: usize,
}

impl TrainCommand {
    /// Resolves the effective configuration: defaults, then the config
    /// file, then flags.
    pub fn train_config(&self) -> Result<TrainConfig> {
        let mut config = match &self.config {
            Some(path) => TrainConfig::from_json_file(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?,
            None => TrainConfig::default(),
        };

        if let Some(seed) = self.seed {
            config.seed = seed;
        }
        if let Some(fraction) = self.test_fraction {
            config.test_fraction = fraction;
        }
        if let Some(n) = self.n_estimators {
            config.forest.n_estimators = n;
        }
        if let Some(limit) = self.max_depth {
            config.forest.tree.max_depth = limit.as_option();
        }
        if let Some(folds) = self.cv_folds {
            config.cv_folds = folds;
        }

        config.validate().context("Invalid training configuration")?;
        Ok(config)
    }

    pub fn run(&self) -> Result<()> {
        let config = self.train_config()?;
        configure_workers(self.workers);

        info!(
            dataset = %self.dataset.display(),
            model_dir = %self.model_dir.display(),
            trees = config.forest.n_estimators,
            seed = config.seed,
            "Training"
        );

        let predictor = DemandPredictor::train(&self.dataset, &config)
            .with_context(|| format!("Training on {} failed", self.dataset.display()))?;
        predictor
            .save(&self.model_dir)
            .with_context(|| format!("Failed to save model to {}", self.model_dir.display()))?;

        if let Some(report) = predictor.report() {
            print_json(report)?;
        }
        Ok(())
    }
}
