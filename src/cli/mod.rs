//! CLI module for Forge
//!
//! Commands:
//! - `serve`: start the HTTP server (default)
//! - `run`: one direct crew run, printing the archive path

use clap::{Parser, Subcommand};
use tracing::info;

/// Forge service CLI
#[derive(Parser, Debug)]
#[command(name = "forge")]
#[command(about = "Autonomous software-team service")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the HTTP server (default)
    Serve,
    /// Execute one crew run and print the archive path
    Run {
        /// Requirement text; falls back to the configured default
        #[arg(long)]
        requirements: Option<String>,
    },
}

/// Run the CLI command
pub async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Some(Commands::Run { requirements }) => run_once(requirements).await,
        Some(Commands::Serve) | None => crate::server::run().await,
    }
}

/// One direct run with the configured defaults; the run directory is kept.
async fn run_once(requirements: Option<String>) -> anyhow::Result<()> {
    let config = crate::server::load_config()?;
    let service = crate::service::CrewService::from_config(&config)?;
    let inputs = service.default_inputs(requirements);

    info!("Starting direct crew run");
    let zip_path = service.run_once(inputs).await?;

    println!("Created delivery archive at: {}", zip_path.display());
    Ok(())
}
