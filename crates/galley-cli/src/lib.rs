//! Galley CLI Library
//!
//! Subcommands of the `galley` binary:
//!
//! - **train**: fit a model on a consumption export and save the bundle
//! - **predict**: predict units for one product on one flight
//! - **plan**: stocking plan for one or more flights
//! - **batch**: predict every row of a request CSV
//! - **summarize**: exploration report over a consumption export
//! - **tune**: grid search over forest hyperparameters
//!
//! # Example
//!
//! ```bash
//! galley train --dataset consumption.csv --model-dir models/latest
//! galley predict --model-dir models/latest --origin DOH --flight-type long-haul \
//!     --service-type Retail --passenger-count 250 --product-name "Still Water 500ml" --unit-cost 0.5
//! ```
//!
//! Every command prints JSON on stdout; logs go to stderr.

pub mod commands;

use clap::{Parser, Subcommand};

pub use commands::{
    BatchCommand, PlanCommand, PredictCommand, SummarizeCommand, TrainCommand, TuneCommand,
};

/// Galley - catering consumption-demand predictor
#[derive(Parser, Debug)]
#[command(name = "galley")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Train a model and save it as a bundle
    Train(TrainCommand),

    /// Predict consumed units for one product
    Predict(PredictCommand),

    /// Build a stocking plan from a JSON flight request
    Plan(PlanCommand),

    /// Predict every row of a request CSV
    Batch(BatchCommand),

    /// Print consumption statistics for a dataset
    Summarize(SummarizeCommand),

    /// Search forest hyperparameters by cross-validation
    Tune(TuneCommand),
}
