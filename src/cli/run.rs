//! CLI entry point and dispatch logic
//!
//! `run()` parses arguments, initialises logging, discovers configuration,
//! creates the tokio runtime and dispatches to the command handlers. It
//! prints every error itself; `main` only maps the result to an exit code.

use clap::Parser;
use steprun_config::{Config, ConfigError};
use steprun_runner::RunnerError;
use steprun_utils::logging::init_tracing;

use super::args::Cli;
use super::commands;
use crate::ExitCode;

/// Main CLI execution function.
pub fn run() -> Result<(), ExitCode> {
    let cli = Cli::parse();

    if let Err(e) = init_tracing(cli.verbose) {
        eprintln!("✗ Failed to initialize logging: {e}");
    }

    let config = match Config::discover(cli.config.as_deref()) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("✗ {err}");
            return Err(ExitCode::from(&err));
        }
    };
    tracing::debug!(source = ?config.source, "Loaded configuration");
    let settings = config.runner_settings(|key| std::env::var(key).ok());

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("✗ Failed to create async runtime: {e}");
            return Err(ExitCode::INTERNAL);
        }
    };

    match rt.block_on(commands::dispatch(cli.command, &settings)) {
        Ok(()) => Ok(()),
        Err(err) => {
            eprintln!("✗ {err:#}");
            Err(exit_code_for(&err))
        }
    }
}

fn exit_code_for(err: &anyhow::Error) -> ExitCode {
    if let Some(err) = err.downcast_ref::<RunnerError>() {
        ExitCode::from(err)
    } else if let Some(err) = err.downcast_ref::<ConfigError>() {
        ExitCode::from(err)
    } else {
        ExitCode::INTERNAL
    }
}
