//! Launching and supervising language step runners
//!
//! A step runner is a separate executable, described by a JSON descriptor,
//! that connects back to the framework over a loopback TCP socket. This crate
//! covers its whole lifecycle:
//!
//! - [`descriptor`]: locating and parsing runner descriptors
//! - [`launcher`]: spawning the runner with its port in the environment and
//!   supervising the process
//! - [`handshake`]: waiting for the runner to connect, with timeout and
//!   cancellation
//! - [`test_runner`]: the connected runner and its graceful-then-forced stop
//! - [`init_hook`]: the runner's one-time init command

mod command_spec;
mod conn;
pub mod descriptor;
pub mod error;
pub mod handshake;
pub mod init_hook;
pub mod launcher;
pub mod message;
pub mod output;
pub mod platform;
mod start;
pub mod test_runner;

pub use command_spec::CommandSpec;
pub use conn::ConnectionHandler;
pub use descriptor::{DescriptorLocator, PluginDirLocator, RunnerDescriptor, load_descriptor};
pub use error::RunnerError;
pub use handshake::{LaunchOptions, connect, start_runner};
pub use init_hook::run_init_hook;
pub use launcher::{ProcessHandle, ProcessState, build_child_env, launch};
pub use output::{BufferedSink, OutputSink, OutputStream, TracingSink};
pub use platform::{Platform, PlatformCommands};
pub use start::StartChannels;
pub use test_runner::{RunnerState, TestRunner};
