//! `watchpost` -- operator CLI for security log triage.

mod cli;
mod commands;
mod context;
mod error;
mod logging;
mod output;

use std::path::Path;

use clap::Parser;
use colored::Colorize;

use watchpost_core::config::{GeneralConfig, WatchpostConfig};
use watchpost_core::error::{ConfigError, WatchpostError};

use crate::cli::{Cli, Commands};
use crate::context::AppContext;
use crate::error::CliError;
use crate::output::OutputWriter;

const DEFAULT_CONFIG_PATH: &str = "watchpost.toml";

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let code = match run(cli).await {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("{} {e}", "error:".red().bold());
            e.exit_code()
        }
    };
    std::process::exit(code);
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let writer = OutputWriter::new(cli.output);
    let loaded = load_config(&cli).await;

    // tracing must be up before any command runs, even when the config is broken
    let general = match &loaded {
        Ok(config) => config.general.clone(),
        Err(_) => GeneralConfig {
            log_level: cli.log_level.clone().unwrap_or_else(|| "warn".to_owned()),
            ..Default::default()
        },
    };
    logging::init_tracing(&general).map_err(|e| CliError::Config(e.to_string()))?;
    watchpost_core::metrics::describe_all();

    match cli.command {
        Commands::Config(args) => {
            commands::config::execute(args, &cli.config, loaded, &writer).await
        }
        command => {
            let ctx = AppContext::open(loaded?).await?;
            commands::dispatch(command, &ctx, &writer).await
        }
    }
}

/// Loads the configuration and applies CLI flag overrides.
///
/// A missing file at the default path falls back to defaults plus
/// environment overrides. A missing file that was asked for explicitly is an
/// error.
async fn load_config(cli: &Cli) -> Result<WatchpostConfig, CliError> {
    let mut config = match WatchpostConfig::load(&cli.config).await {
        Ok(config) => config,
        Err(WatchpostError::Config(ConfigError::FileNotFound { .. }))
            if cli.config == Path::new(DEFAULT_CONFIG_PATH) =>
        {
            let mut config = WatchpostConfig::default();
            config.apply_env_overrides();
            config
        }
        Err(e) => return Err(e.into()),
    };

    if let Some(level) = &cli.log_level {
        config.general.log_level = level.clone();
    }
    if let Some(operator) = &cli.operator {
        config.general.operator = operator.clone();
    }
    config.validate()?;
    Ok(config)
}
