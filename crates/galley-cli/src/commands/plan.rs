use super::print_json;
use anyhow::{Context, Result};
use clap::Args;
use galley_serving::{plan, plan_fleet, DemandPredictor, FlightPlanRequest};
use serde::Deserialize;
use std::path::PathBuf;

/// Build a stocking plan from a JSON flight request
///
/// The request file holds either one flight object or an array of them.
#[derive(Args, Debug, Clone)]
pub struct PlanCommand {
    /// Directory holding the model bundle
    #[arg(long, short = 'd', env = "GALLEY_MODEL_DIR")]
    pub model_dir: PathBuf,

    /// Flight request file (JSON)
    #[arg(long, short = 'r')]
    pub request: PathBuf,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PlanInput {
    One(FlightPlanRequest),
    Many(Vec<FlightPlanRequest>),
}

impl PlanCommand {
    pub fn run(&self) -> Result<()> {
        let raw = std::fs::read_to_string(&self.request)
            .with_context(|| format!("Failed to read {}", self.request.display()))?;
        let input: PlanInput =
            serde_json::from_str(&raw).context("Failed to parse flight request JSON")?;

        let predictor = DemandPredictor::load(&self.model_dir)
            .with_context(|| format!("Failed to load model from {}", self.model_dir.display()))?;

        match input {
            PlanInput::One(request) => {
                let flight = plan(&predictor, &request)
                    .with_context(|| format!("Failed to plan flight '{}'", request.flight_id))?;
                print_json(&flight)
            }
            PlanInput::Many(requests) => {
                let fleet = plan_fleet(&predictor, &requests).context("Failed to plan flights")?;
                print_json(&fleet)
            }
        }
    }
}
