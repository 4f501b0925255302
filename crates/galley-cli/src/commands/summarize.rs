use super::print_json;
use anyhow::{Context, Result};
use clap::Args;
use galley_data::{load, summarize};
use std::path::PathBuf;

/// Print consumption statistics for a dataset
#[derive(Args, Debug, Clone)]
pub struct SummarizeCommand {
    /// Consumption export (CSV)
    #[arg(long, env = "GALLEY_DATASET")]
    pub dataset: PathBuf,
}

impl SummarizeCommand {
    pub fn run(&self) -> Result<()> {
        let corpus = load(&self.dataset)
            .with_context(|| format!("Failed to load {}", self.dataset.display()))?;
        print_json(&summarize(&corpus))
    }
}
