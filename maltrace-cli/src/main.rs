//! maltrace CLI entry point
//!
//! Parses arguments, loads `maltrace.toml`, initialises logging and hands off
//! to the subcommand handler. Errors are printed to stderr and mapped to an
//! exit code through [`CliError::exit_code`].

mod cli;
mod commands;
mod engine;
mod error;
mod logging;
mod output;

use std::path::Path;

use clap::Parser;
use colored::Colorize;

use maltrace_core::config::{GeneralConfig, MaltraceConfig};

use crate::cli::{Cli, Commands};
use crate::error::CliError;
use crate::logging::{effective_general, init_tracing};
use crate::output::OutputWriter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let writer = OutputWriter::new(cli.output);

    if let Err(e) = run(cli, &writer).await {
        tracing::debug!(error = %e, exit_code = e.exit_code(), "command failed");
        eprintln!("{} {}", "error:".red().bold(), e);
        std::process::exit(e.exit_code());
    }
}

async fn run(cli: Cli, writer: &OutputWriter) -> Result<(), CliError> {
    let Cli {
        config: config_path,
        log_level,
        log_format,
        command,
        ..
    } = cli;
    let overrides = (log_level.as_deref(), log_format.as_deref());

    match command {
        // `config` reports problems with the file itself, so it must not require a valid one.
        Commands::Config(args) => {
            let general = effective_general(&GeneralConfig::default(), overrides.0, overrides.1);
            init_tracing(&general).map_err(|e| CliError::Config(e.to_string()))?;
            commands::config::execute(args, &config_path, writer).await
        }
        Commands::Scan(args) => {
            let config = prepare(&config_path, overrides).await?;
            commands::scan::execute(args, &config, writer).await
        }
        Commands::Detect(args) => {
            let config = prepare(&config_path, overrides).await?;
            commands::detect::execute(args, &config, writer).await
        }
        Commands::Rules(args) => {
            let config = prepare(&config_path, overrides).await?;
            commands::rules::execute(args, &config, writer).await
        }
        Commands::Evaluate(args) => {
            prepare(&config_path, overrides).await?;
            commands::evaluate::execute(args, writer).await
        }
    }
}

/// Load the configuration and initialise logging from its `[general]` section.
async fn prepare(
    config_path: &Path,
    (log_level, log_format): (Option<&str>, Option<&str>),
) -> Result<MaltraceConfig, CliError> {
    let config = engine::load_config(config_path).await?;
    let general = effective_general(&config.general, log_level, log_format);
    init_tracing(&general).map_err(|e| CliError::Config(e.to_string()))?;
    tracing::debug!(config = %config_path.display(), "maltrace starting");
    Ok(config)
}
