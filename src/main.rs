//! aotguard - Freshness governor for ahead-of-time compiled artifacts
//!
//! CLI entry point that dispatches to subcommands.

use aotguard::cli::{Cli, Commands};
use aotguard::config::ConfigManager;
use aotguard::error::GovernorResult;
use clap::Parser;
use console::style;
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", style("Error:").red().bold(), e);
            if let Some(hint) = e.hint() {
                eprintln!("{} {}", style("Hint:").yellow(), hint);
            }
            ExitCode::FAILURE
        }
    }
}

async fn run() -> GovernorResult<()> {
    let cli = Cli::parse();

    // Initialize logging: 0 = warn, 1 = info, 2+ = debug
    let filter = match cli.verbose {
        0 => EnvFilter::new("aotguard=warn"),
        1 => EnvFilter::new("aotguard=info"),
        _ => EnvFilter::new("aotguard=debug"),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();

    // Load configuration
    let config_manager = if let Some(ref path) = cli.config {
        ConfigManager::with_path(path.clone())
    } else {
        ConfigManager::new()
    };
    debug!("Using config file {}", config_manager.path().display());

    let config = config_manager.load().await?;

    // Dispatch to command
    match cli.command {
        Commands::Status(args) => aotguard::cli::commands::status(args, &config).await,
        Commands::Plan(args) => aotguard::cli::commands::plan(args, &config).await,
        Commands::Update(args) => aotguard::cli::commands::update(args, &config).await,
        Commands::Config(args) => {
            aotguard::cli::commands::config(args, &config_manager, &config).await
        }
    }
}
