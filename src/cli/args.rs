//! CLI argument definitions and parsing structures

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// steprun - launch and supervise language step runners
#[derive(Parser, Debug)]
#[command(name = "steprun")]
#[command(about = "Launch, connect to and stop language step runner processes")]
#[command(long_about = r#"
steprun locates an installed step runner from its descriptor, checks that it
supports this framework version, starts it, waits for it to connect back over
a loopback socket, and stops it again, forcefully if it does not comply.

EXAMPLES:
  # Show the installed ruby runner and whether it is compatible
  steprun check ruby

  # Run the runner's one-time init command
  steprun init ruby

  # Start the runner, keep it live for two seconds, then stop it
  steprun start ruby --hold-ms 2000

CONFIGURATION:
  Configuration is loaded from --config, $STEPRUN_HOME/config.toml, or
  .steprun/config.toml searched upward from the current directory.
  GAUGE_PORT, runner_connection_timeout and plugin_kill_timeout override it.
"#)]
#[command(version)]
pub struct Cli {
    /// Path to configuration file (overrides discovery)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Commands {
    /// Show a runner's descriptor and check it supports this framework version
    Check {
        /// Runner language, e.g. `ruby`
        language: String,
    },

    /// Run a runner's init command in its install directory
    Init {
        /// Runner language, e.g. `ruby`
        language: String,
    },

    /// Start a runner, hold it live, then stop it
    Start {
        /// Runner language, e.g. `ruby`
        language: String,

        /// How long to keep the runner live before stopping it; Ctrl-C stops early
        #[arg(long, default_value_t = 0)]
        hold_ms: u64,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_start_with_globals_after_subcommand() {
        let cli = Cli::try_parse_from([
            "steprun",
            "start",
            "ruby",
            "--hold-ms",
            "250",
            "--verbose",
            "--config",
            "/tmp/steprun.toml",
        ])
        .unwrap();

        assert!(cli.verbose);
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/steprun.toml")));
        assert_eq!(
            cli.command,
            Commands::Start {
                language: "ruby".to_string(),
                hold_ms: 250
            }
        );
    }

    #[test]
    fn test_language_is_required() {
        assert!(Cli::try_parse_from(["steprun", "check"]).is_err());
    }

    #[test]
    fn test_cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
