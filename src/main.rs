//! Binary entry point for carewatch.
//!
//! This binary provides the administrative CLI: submit a request, run a
//! long-lived console with escalation timers in the background, and show the
//! effective configuration.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(missing_docs)]
// Allow print_stderr in main binary for CLI output
#![allow(clippy::print_stderr)]
#![allow(clippy::print_stdout)]
// Allow multiple crate versions from transitive dependencies
#![allow(clippy::multiple_crate_versions)]

mod commands;

use carewatch::CarewatchConfig;
use carewatch::observability::{self, InitOptions, ObservabilityConfig};
use carewatch::tools::{Fixture, FixtureToolProvider};
use clap::{Parser, Subcommand};
use commands::SubmitArgs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

/// Carewatch - an elder-care monitoring assistant.
#[derive(Parser)]
#[command(name = "carewatch")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand)]
enum Commands {
    /// Route one request and print the outcome.
    Submit(SubmitArgs),

    /// Read admin commands from stdin; escalation timers run in the background.
    Console,

    /// Show configuration.
    Config {
        /// Show current configuration.
        #[arg(long)]
        show: bool,
    },
}

/// Main entry point.
#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let config = match CarewatchConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            return ExitCode::FAILURE;
        },
    };

    let observability = match observability::init(ObservabilityConfig::from_config(
        &config,
        InitOptions {
            verbose: cli.verbose,
            metrics_expose: matches!(cli.command, Commands::Console),
        },
    )) {
        Ok(handle) => handle,
        Err(e) => {
            eprintln!("Failed to initialize observability: {e}");
            return ExitCode::FAILURE;
        },
    };

    let result = run_command(cli.command, config, &observability).await;

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        },
    }
}

/// Runs the selected command.
async fn run_command(
    command: Commands,
    config: CarewatchConfig,
    observability: &observability::ObservabilityHandle,
) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Commands::Submit(args) => {
            let provider = load_provider(config.fixtures.as_deref())?;
            commands::cmd_submit(&config, provider, args).await
        },
        Commands::Console => {
            let provider = load_provider(config.fixtures.as_deref())?;
            commands::cmd_console(&config, provider, observability.metrics()).await
        },
        Commands::Config { show } => commands::cmd_config(&config, show),
    }
}

/// Builds the in-memory provider from the fixture file, or the demo household.
fn load_provider(path: Option<&Path>) -> carewatch::Result<Arc<FixtureToolProvider>> {
    let fixture = match path {
        Some(path) => Fixture::load(path)?,
        None => Fixture::demo(),
    };
    Ok(Arc::new(FixtureToolProvider::new(fixture)))
}
