//! cppkg CLI

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use cppkg_cli::cmd;
use cppkg_cli::{Cli, Commands, Settings};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Commands::Completions { shell } = cli.command {
        cmd::completions::completions(shell);
        return Ok(());
    }

    let settings = Settings::from_cli(&cli)?;
    match &cli.command {
        Commands::Install { spec } => cmd::install::install(&settings, spec).await,
        Commands::Info { package } => cmd::info::info(&settings, package),
        Commands::Update => cmd::update::update(&settings),
        Commands::Completions { .. } => Ok(()),
    }
}
