use super::print_json;
use anyhow::{Context, Result};
use clap::Args;
use galley_serving::{DemandPredictor, PredictionRequest};
use serde::Serialize;
use std::path::PathBuf;

/// Predict consumed units for one product on one flight
#[derive(Args, Debug, Clone)]
pub struct PredictCommand {
    /// Directory holding the model bundle
    #[arg(long, short = 'd', env = "GALLEY_MODEL_DIR")]
    pub model_dir: PathBuf,

    #[arg(long)]
    pub origin: String,

    #[arg(long)]
    pub flight_type: String,

    #[arg(long)]
    pub service_type: String,

    #[arg(long)]
    pub passenger_count: f64,

    #[arg(long)]
    pub product_name: String,

    #[arg(long)]
    pub unit_cost: f64,

    /// Crew reported an operational issue
    #[arg(long)]
    pub has_issues: bool,
}

#[derive(Serialize)]
struct PredictOutput<'a> {
    request: &'a PredictionRequest,
    units: u64,
}

impl PredictCommand {
    pub fn request(&self) -> PredictionRequest {
        PredictionRequest::new(
            self.origin.as_str(),
            self.flight_type.as_str(),
            self.service_type.as_str(),
            self.passenger_count,
            self.product_name.as_str(),
            self.unit_cost,
        )
        .with_issues(self.has_issues)
    }

    pub fn run(&self) -> Result<()> {
        let predictor = DemandPredictor::load(&self.model_dir)
            .with_context(|| format!("Failed to load model from {}", self.model_dir.display()))?;
        let request = self.request();
        let units = predictor.predict(&request).context("Prediction failed")?;
        print_json(&PredictOutput {
            request: &request,
            units,
        })
    }
}
