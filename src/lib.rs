//! steprun - launch and supervise language step runners
//!
//! A step runner is the language-specific half of a Gauge-style test
//! framework: an external process that executes steps and talks to the
//! framework over a loopback socket. steprun finds a runner from its
//! descriptor, checks it supports this framework version, starts it, waits
//! for it to connect back, and later stops it, forcefully if it must.
//!
//! # Quick Start (CLI)
//!
//! ```bash
//! # Show the installed ruby runner and whether it is compatible
//! steprun check ruby
//!
//! # Start the runner, keep it live for two seconds, then stop it
//! steprun start ruby --hold-ms 2000
//! ```
//!
//! # Quick Start (Library)
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use steprun::{FRAMEWORK_VERSION, LaunchOptions, PluginDirLocator, start_runner};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> Result<(), steprun::RunnerError> {
//! let locator = PluginDirLocator::new("/home/me/.gauge/plugins");
//! let options = LaunchOptions::new(Duration::from_secs(30));
//! let mut runner = start_runner(
//!     &locator,
//!     "ruby",
//!     &FRAMEWORK_VERSION,
//!     &options,
//!     CancellationToken::new(),
//! )
//! .await?;
//!
//! runner
//!     .stop(Duration::from_secs(4), Duration::from_millis(100))
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod exit_codes;

pub use exit_codes::ExitCode;
pub use steprun_config::{Config, ConfigError, RunnerSettings};
pub use steprun_runner::{
    DescriptorLocator, LaunchOptions, PluginDirLocator, RunnerDescriptor, RunnerError,
    RunnerState, StartChannels, TestRunner, connect, load_descriptor, run_init_hook,
    start_runner,
};
pub use steprun_utils::{FRAMEWORK_VERSION, Version};
