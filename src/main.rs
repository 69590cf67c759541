//! Templar - a development server for templ components.

#![allow(dead_code)]

mod build;
mod cache;
mod cli;
mod component;
mod config;
mod core;
mod embed;
mod errors;
mod logger;
mod plugin;
mod reload;
mod scan;
mod server;
mod utils;
mod watch;

use std::process::ExitCode;
use std::sync::Arc;

use clap::{ColorChoice, Parser};
use cli::{Cli, Commands};
use config::{TemplarConfig, init_config};

/// Exit code for config/validation failures.
const EXIT_CONFIG: u8 = 2;

fn main() -> ExitCode {
    // Setup global Ctrl+C handler (before any blocking operations)
    if let Err(e) = core::setup_shutdown_handler() {
        log!("error"; "{}", e);
        return ExitCode::FAILURE;
    }

    let cli = Cli::parse();
    logger::set_verbose(cli.verbose);

    // Set global color override based on CLI option
    match cli.color {
        ColorChoice::Always => owo_colors::set_override(true),
        ColorChoice::Never => owo_colors::set_override(false),
        ColorChoice::Auto => {} // owo-colors auto-detects TTY
    }

    // Init scaffolds the config; everything else loads it.
    if let Commands::Init { name } = &cli.command {
        return match cli::init::run(name.as_deref()) {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                log!("error"; "{:#}", e);
                ExitCode::FAILURE
            }
        };
    }

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            log!("error"; "{:#}", e);
            return ExitCode::from(EXIT_CONFIG);
        }
    };

    let outcome = match &cli.command {
        Commands::Init { .. } => unreachable!("handled above"),
        Commands::Serve { .. } => cli::serve::run(config),
        Commands::List => cli::list::run(config),
        Commands::Preview { name, output } => {
            cli::preview::run(config, name, output.as_deref())
        }
        Commands::Build => cli::build::run(config),
        Commands::Watch => cli::watch::run(config),
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log!("error"; "{:#}", e);
            ExitCode::FAILURE
        }
    }
}

/// Load, override, validate, and install the global config.
fn load_config(cli: &Cli) -> anyhow::Result<Arc<TemplarConfig>> {
    let cwd = std::env::current_dir()?;
    let mut config = TemplarConfig::discover(&cwd, cli.config.as_deref())?;

    // CLI flags override the file.
    if let Commands::Serve { host, port } = &cli.command {
        if let Some(host) = host {
            config.server.host = host.clone();
        }
        if let Some(port) = port {
            config.server.port = *port;
        }
        config.validate()?;
    }

    Ok(init_config(config))
}
