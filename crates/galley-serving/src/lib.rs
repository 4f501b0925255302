//! Prediction front end for Galley.
//!
//! [`DemandPredictor`] is the single handle callers use: train it from a
//! dataset or load it from a bundle, then ask it for unit counts. On top of
//! it sit flight plans ([`plan`]) and batch runs ([`predict_batch`]).
//!
//! ```no_run
//! use galley_serving::{DemandPredictor, PredictionRequest};
//!
//! fn main() -> galley_serving::ServingResult<()> {
//!     let predictor = DemandPredictor::load("models/latest")?;
//!     let units = predictor.predict(&PredictionRequest::new(
//!         "DOH", "long-haul", "Retail", 250.0, "Still Water 500ml", 0.5,
//!     ))?;
//!     println!("stock {units} units");
//!     Ok(())
//! }
//! ```

pub mod batch;
pub mod error;
pub mod plan;
pub mod predictor;

pub use batch::{predict_batch, predict_batch_file, read_requests, BatchOutcome, BatchReport, REQUEST_COLUMNS};
pub use error::{ServingError, ServingResult};
pub use plan::{plan, plan_fleet, FleetPlan, FlightPlan, FlightPlanRequest, PlanItem, PlanLine, PlanTotals};
pub use predictor::{to_units, DemandPredictor, PredictionRequest};
