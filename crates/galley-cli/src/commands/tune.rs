use super::{configure_workers, print_json};
use anyhow::{Context, Result};
use clap::Args;
use galley_data::{load, preprocess};
use galley_training::{tune, ParamGrid};
use std::path::PathBuf;
use tracing::info;

/// Search forest hyperparameters by cross-validation
///
/// The full grid has 243 candidates; `--quick` uses a 16-candidate grid.
#[derive(Args, Debug, Clone)]
pub struct TuneCommand {
    /// Consumption export (CSV)
    #[arg(long, env = "GALLEY_DATASET")]
    pub dataset: PathBuf,

    /// Cross-validation folds per candidate
    #[arg(long, default_value = "3")]
    pub folds: usize,

    /// Use the small grid
    #[arg(long)]
    pub quick: bool,

    #[arg(long, default_value = "42")]
    pub seed: u64,

    /// Worker threads for tree fitting (0 = number of CPUs)
    #[arg(long, default_value = "0")]
    pub workers: usize,
}

impl TuneCommand {
    pub fn grid(&self) -> ParamGrid {
        if self.quick {
            ParamGrid::quick()
        } else {
            ParamGrid::default()
        }
    }

    pub fn run(&self) -> Result<()> {
        configure_workers(self.workers);
        let corpus = load(&self.dataset)
            .with_context(|| format!("Failed to load {}", self.dataset.display()))?;
        let prepared = preprocess(&corpus);
        let grid = self.grid();
        info!(candidates = grid.len(), folds = self.folds, "Tuning");

        let report = tune(
            prepared.features.rows(),
            &prepared.target,
            &grid,
            self.folds,
            self.seed,
        )
        .context("Grid search failed")?;
        print_json(&report)
    }
}
