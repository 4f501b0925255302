//! Galley CLI - train, query and inspect the catering demand predictor.

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use galley_cli::{Cli, Commands};

fn main() -> Result<()> {
    // Logs go to stderr so stdout stays valid JSON.
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env().add_directive("galley=info".parse()?))
        .init();

    let cli = Cli::parse();
    info!("Galley CLI starting");

    match cli.command {
        Commands::Train(cmd) => cmd.run()?,
        Commands::Predict(cmd) => cmd.run()?,
        Commands::Plan(cmd) => cmd.run()?,
        Commands::Batch(cmd) => cmd.run()?,
        Commands::Summarize(cmd) => cmd.run()?,
        Commands::Tune(cmd) => cmd.run()?,
    }

    Ok(())
}
