//! # krysalis-build
//!
//! Build orchestrator for the Krysalis workspace.
//!
//! Builds the managed and native projects with their own toolchains, copies
//! the native libraries next to the managed assemblies that load them,
//! optionally installs the mod into the host application, and runs every
//! test suite.
//!
//! ## Usage
//!
//! ```bash
//! # Release build, copy, test
//! krysalis-build
//!
//! # Debug build, install into the host's mods directory
//! krysalis-build --debug --install
//!
//! # Collect every build failure instead of stopping at the first
//! krysalis-build --keep-going
//! ```

mod cli;

use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use cli::Cli;
use colored::Colorize;
use krysalis_build::{
    Error, Orchestrator, config::FileConfig, error::EXIT_FAILURE, output::JsonOutput,
};
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// Entry point.
///
/// Runs [`inner_main`] and maps its error to an exit code: test failures
/// exit with 2, everything else with 1.
fn main() -> ExitCode {
    match inner_main() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{} {err}", "Error:".red().bold());

            let code = err
                .downcast_ref::<Error>()
                .map_or(EXIT_FAILURE, Error::exit_code);
            ExitCode::from(code)
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "info" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Parse arguments, layer the configuration and run every selected phase.
///
/// # Errors
///
/// - Configuration file errors
/// - Project resolution errors
/// - Build, copy and test failures
/// - JSON serialization
fn inner_main() -> Result<()> {
    let args = Cli::parse();
    let json_mode = args.json();

    init_tracing(args.verbose());

    let config_path = args.config_path();
    debug!(path = %config_path.display(), "loading configuration");
    let file_config = FileConfig::load(&config_path)?;
    let config = args.orchestrator_config(file_config)?;

    let orchestrator = Orchestrator::new(config).with_quiet(json_mode);
    let summary = match orchestrator.run(args.phases()) {
        Ok(summary) => summary,
        Err(err) if json_mode => {
            let output = JsonOutput::from_error(&err);
            println!("{}", serde_json::to_string_pretty(&output)?);
            return Err(err.into());
        }
        Err(err) => return Err(err.into()),
    };

    if json_mode {
        let output = JsonOutput::from_summary(&summary);
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else if summary.check().is_ok() {
        println!("\n{}", "✨ Everything built and passed!".green().bold());
    }

    summary.check()?;

    Ok(())
}
