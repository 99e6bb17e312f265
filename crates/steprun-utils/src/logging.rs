//! Logging infrastructure for steprun
//!
//! Diagnostics go through `tracing`. Components that report to the operator
//! (forced kills, runner output, advisory exit errors) take a [`Logger`]
//! explicitly instead of reaching for process-wide state, so tests can swap in
//! a recording implementation.

use std::io::IsTerminal;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{
    EnvFilter,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

/// Check if colored output should be used.
///
/// Returns true only if stderr is a terminal and `NO_COLOR` is not set.
fn use_color() -> bool {
    std::io::stderr().is_terminal() && std::env::var_os("NO_COLOR").is_none()
}

/// Initialize the tracing subscriber.
///
/// `RUST_LOG` wins when set. Otherwise `verbose` selects between
/// `steprun=debug,info` (with span close events and targets) and the compact
/// `steprun=info,warn` format.
pub fn init_tracing(verbose: bool) -> Result<(), Box<dyn std::error::Error>> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| {
            if verbose {
                EnvFilter::try_new("steprun=debug,info")
            } else {
                EnvFilter::try_new("steprun=info,warn")
            }
        })
        .unwrap_or_else(|_| EnvFilter::new("info"));

    if verbose {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_ansi(use_color())
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_thread_names(false)
                    .with_line_number(false)
                    .with_file(false)
                    .with_span_events(FmtSpan::CLOSE)
                    .compact(),
            )
            .try_init()?;
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_ansi(use_color())
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_thread_names(false)
                    .with_line_number(false)
                    .with_file(false)
                    .compact(),
            )
            .try_init()?;
    }

    Ok(())
}

/// Operator-facing log capability.
pub trait Logger: Send + Sync {
    fn info(&self, message: &str);
    fn warning(&self, message: &str);
    fn debug(&self, message: &str);
    fn error(&self, message: &str);
}

/// [`Logger`] that forwards to `tracing` under the `steprun` target.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn info(&self, message: &str) {
        info!(target: "steprun", "{message}");
    }

    fn warning(&self, message: &str) {
        warn!(target: "steprun", "{message}");
    }

    fn debug(&self, message: &str) {
        debug!(target: "steprun", "{message}");
    }

    fn error(&self, message: &str) {
        error!(target: "steprun", "{message}");
    }
}

#[cfg(any(test, feature = "test-utils"))]
pub use recording::{LogLevel, RecordingLogger};

#[cfg(any(test, feature = "test-utils"))]
mod recording {
    use super::Logger;
    use std::sync::Mutex;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum LogLevel {
        Info,
        Warning,
        Debug,
        Error,
    }

    /// Logger that keeps every entry in memory for assertions.
    #[derive(Debug, Default)]
    pub struct RecordingLogger {
        entries: Mutex<Vec<(LogLevel, String)>>,
    }

    impl RecordingLogger {
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        #[must_use]
        pub fn entries(&self) -> Vec<(LogLevel, String)> {
            self.entries
                .lock()
                .map(|entries| entries.clone())
                .unwrap_or_default()
        }

        /// Messages recorded at `level`, in order.
        #[must_use]
        pub fn messages(&self, level: LogLevel) -> Vec<String> {
            self.entries()
                .into_iter()
                .filter(|(l, _)| *l == level)
                .map(|(_, message)| message)
                .collect()
        }

        fn record(&self, level: LogLevel, message: &str) {
            if let Ok(mut entries) = self.entries.lock() {
                entries.push((level, message.to_string()));
            }
        }
    }

    impl Logger for RecordingLogger {
        fn info(&self, message: &str) {
            self.record(LogLevel::Info, message);
        }

        fn warning(&self, message: &str) {
            self.record(LogLevel::Warning, message);
        }

        fn debug(&self, message: &str) {
            self.record(LogLevel::Debug, message);
        }

        fn error(&self, message: &str) {
            self.record(LogLevel::Error, message);
        }
    }
}
