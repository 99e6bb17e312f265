//! Command-line interface for steprun
//!
//! - `args`: CLI argument definitions (clap)
//! - `run`: entry point and command dispatch
//! - `commands`: command implementations

pub mod args;
mod commands;
mod run;

pub use args::{Cli, Commands};
pub use run::run;
