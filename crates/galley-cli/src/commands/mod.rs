//! CLI Command Implementations

mod batch;
mod plan;
mod predict;
mod summarize;
mod train;
mod tune;

pub use batch::BatchCommand;
pub use plan::PlanCommand;
pub use predict::PredictCommand;
pub use summarize::SummarizeCommand;
pub use train::TrainCommand;
pub use tune::TuneCommand;

use anyhow::{Context, Result};
use serde::Serialize;

/// Writes `value` to stdout as pretty JSON.
pub(crate) fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to encode output as JSON")?;
    println!("{json}");
    Ok(())
}

/// Sizes the global rayon pool; 0 means one thread per CPU.
pub(crate) fn configure_workers(workers: usize) -> usize {
    let workers = if workers == 0 { num_cpus::get() } else { workers };
    if rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .build_global()
        .is_err()
    {
        tracing::debug!("Global thread pool already initialized");
    }
    tracing::info!(workers, "Configured worker pool");
    workers
}
