// src/main.rs

use anyhow::Result;
use clap::{CommandFactory, Parser};
use std::process::ExitCode;
use stubkit::config::Config;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;

use cli::{CacheCommands, Cli, Commands};

/// Log filter: RUST_LOG wins, otherwise derived from -v
fn env_filter(verbose: u8) -> EnvFilter {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // Initialize tracing subscriber for logging
    tracing_subscriber::fmt()
        .with_env_filter(env_filter(cli.verbose))
        .with_writer(std::io::stderr)
        .init();

    let config = Config::discover(cli.config.as_deref())?;

    let ok = match cli.command {
        Commands::Install {
            request,
            force,
            target,
            jobs,
            registry,
        } => {
            let options = commands::InstallOptions {
                force,
                target,
                jobs,
                registry,
            };
            commands::cmd_install(&config, &request, options).await?
        }
        Commands::Resolve { request } => commands::cmd_resolve(&config, &request)?,
        Commands::ValidateDefs { definitions } => {
            commands::cmd_validate_defs(&config, definitions)?;
            true
        }
        Commands::Cache { command } => {
            match command {
                CacheCommands::Prune { max_age_days } => {
                    commands::cmd_cache_prune(&config, max_age_days)?
                }
                CacheCommands::Clean => commands::cmd_cache_clean(&config)?,
            }
            true
        }
        Commands::Completions { shell } => {
            clap_complete::generate(
                shell,
                &mut Cli::command(),
                "stubkit",
                &mut std::io::stdout(),
            );
            true
        }
    };

    Ok(if ok {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
