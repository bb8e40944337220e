//! loopevents CLI: the main entry point.
//!
//! Commands:
//! - `init`   Print (or write) the default configuration
//! - `check`  Load and validate a configuration file

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(
    name = "loopevents",
    about = "loopevents: scheduler-driven agent loop orchestrator",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the default configuration
    Init {
        /// Write it to ~/.loopevents/config.toml instead of printing it
        #[arg(long)]
        write: bool,
    },

    /// Validate a configuration file and show the effective settings
    Check {
        /// Config file to check (defaults to ~/.loopevents/config.toml)
        #[arg(short, long, env = "LOOPEVENTS_CONFIG")]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    match cli.command {
        Commands::Init { write } => commands::init::run(write).await?,
        Commands::Check { config } => commands::check::run(config).await?,
    }

    Ok(())
}
