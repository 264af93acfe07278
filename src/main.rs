//! Kolosal Pipeline - command-line entry point

use clap::Parser;
use kolosal_pipeline::cli::{self, Cli};

fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "kolosal_pipeline=info".into()),
        )
        .init();

    cli::run(Cli::parse())
}
