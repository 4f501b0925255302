use super::print_json;
use anyhow::{Context, Result};
use clap::Args;
use galley_serving::{predict_batch_file, DemandPredictor};
use std::path::PathBuf;

/// Predict every row of a request CSV
///
/// Columns: origin, flight_type, service_type, passenger_count,
/// product_name, unit_cost and an optional has_issues.
#[derive(Args, Debug, Clone)]
pub struct BatchCommand {
    /// Directory holding the model bundle
    #[arg(long, short = 'd', env = "GALLEY_MODEL_DIR")]
    pub model_dir: PathBuf,

    /// Request file (CSV)
    #[arg(long, short = 'i')]
    pub input: PathBuf,
}

impl BatchCommand {
    pub fn run(&self) -> Result<()> {
        let predictor = DemandPredictor::load(&self.model_dir)
            .with_context(|| format!("Failed to load model from {}", self.model_dir.display()))?;
        let report = predict_batch_file(&predictor, &self.input)
            .with_context(|| format!("Batch prediction over {} failed", self.input.display()))?;
        print_json(&report)
    }
}
