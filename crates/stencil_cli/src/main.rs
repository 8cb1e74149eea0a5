//! stencil CLI - Main entry point.
//!
//! Exit codes:
//! - 0: Success
//! - 1: General error
//! - 2: Invalid arguments
//! - 3: Validation failure
//! - 4: Template error

use std::process::ExitCode;

use clap::Parser;
use stencil_config::ConfigError;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod commands;

use commands::{Cli, CliError, Commands};

/// CI-friendly exit codes
pub struct ExitCodes;

impl ExitCodes {
    pub const SUCCESS: u8 = 0;
    pub const GENERAL_ERROR: u8 = 1;
    pub const INVALID_ARGS: u8 = 2;
    pub const VALIDATION_FAILURE: u8 = 3;
    pub const TEMPLATE_ERROR: u8 = 4;
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // RUST_LOG takes precedence over the flags. Targets match by prefix, so
    // `stencil` covers both crates.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(cli.verbose, cli.quiet)));
    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .try_init();

    let quiet = cli.quiet;
    let result = match cli.command {
        Commands::Resolve(args) => commands::resolve::execute(args).await,
        Commands::Templates(args) => commands::templates::execute(args).await,
        Commands::Validate(args) => commands::validate::execute(args, quiet).await,
    };

    match result {
        Ok(()) => ExitCode::from(ExitCodes::SUCCESS),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(categorize_error(&e))
        }
    }
}

fn default_filter(verbose: bool, quiet: bool) -> &'static str {
    if verbose {
        "stencil=debug,warn"
    } else if quiet {
        "error"
    } else {
        "stencil=info,warn"
    }
}

/// Categorize error to determine exit code
fn categorize_error(e: &anyhow::Error) -> u8 {
    for cause in e.chain() {
        if cause.downcast_ref::<CliError>().is_some() {
            return ExitCodes::INVALID_ARGS;
        }
        if let Some(config_error) = cause.downcast_ref::<ConfigError>() {
            return categorize_config_error(config_error);
        }
    }
    ExitCodes::GENERAL_ERROR
}

fn categorize_config_error(e: &ConfigError) -> u8 {
    if e.is_validation() {
        return ExitCodes::VALIDATION_FAILURE;
    }
    match e {
        ConfigError::TemplateNotFound { .. }
        | ConfigError::TemplateString { .. }
        | ConfigError::SchemaFile { .. }
        | ConfigError::UnitMaterialization { .. } => ExitCodes::TEMPLATE_ERROR,
        ConfigError::ProjectNotFound(_) => ExitCodes::INVALID_ARGS,
        _ => ExitCodes::GENERAL_ERROR,
    }
}
