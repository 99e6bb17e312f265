//! Starting a runner and waiting for it to connect back

use std::sync::Arc;
use std::time::Duration;
use steprun_utils::version::Version;
use steprun_utils::{Logger, TracingLogger};
use tokio_util::sync::CancellationToken;

use crate::conn::ConnectionHandler;
use crate::descriptor::{DescriptorLocator, RunnerDescriptor, load_descriptor};
use crate::error::RunnerError;
use crate::launcher;
use crate::output::{OutputSink, TracingSink};
use crate::test_runner::{TestRunner, kill_and_reap};

/// How a runner is started and how long it may take to connect.
#[derive(Clone)]
pub struct LaunchOptions {
    /// Pre-negotiated listener port; `None` lets the OS choose
    pub port: Option<u16>,
    pub connection_timeout: Duration,
    pub logger: Arc<dyn Logger>,
    /// Where runner output goes; defaults to a [`TracingSink`] named after
    /// the runner
    pub sink: Option<Arc<dyn OutputSink>>,
}

impl LaunchOptions {
    #[must_use]
    pub fn new(connection_timeout: Duration) -> Self {
        Self {
            port: None,
            connection_timeout,
            logger: Arc::new(TracingLogger),
            sink: None,
        }
    }

    #[must_use]
    pub fn with_port(mut self, port: Option<u16>) -> Self {
        self.port = port;
        self
    }

    #[must_use]
    pub fn with_logger(mut self, logger: Arc<dyn Logger>) -> Self {
        self.logger = logger;
        self
    }

    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn OutputSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    fn sink_for(&self, descriptor: &RunnerDescriptor) -> Arc<dyn OutputSink> {
        self.sink.clone().unwrap_or_else(|| {
            Arc::new(TracingSink::new(&descriptor.name, self.logger.clone()))
        })
    }
}

impl std::fmt::Debug for LaunchOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LaunchOptions")
            .field("port", &self.port)
            .field("connection_timeout", &self.connection_timeout)
            .finish_non_exhaustive()
    }
}

/// Launch `descriptor`'s runner and wait for it to connect.
///
/// Whichever comes first decides the outcome: the connection, the runner
/// exiting with an error, `options.connection_timeout` elapsing, or
/// `kill_requested` being cancelled. On every failure the process is killed
/// and reaped before the error is returned.
pub async fn connect(
    descriptor: &RunnerDescriptor,
    options: &LaunchOptions,
    kill_requested: CancellationToken,
) -> Result<TestRunner, RunnerError> {
    let logger = options.logger.clone();
    let handler = ConnectionHandler::bind(options.port.unwrap_or(0)).await?;
    let port = handler.port();
    logger.debug(&format!(
        "Listening for runner '{}' on port {port}",
        descriptor.id
    ));

    let (process, mut exit_errors) = launcher::launch(
        descriptor,
        port,
        options.sink_for(descriptor),
        kill_requested.clone(),
        logger.clone(),
    )?;

    // Cancellation is checked first: the kill it triggers also surfaces as
    // an exit error.
    let accepted = tokio::select! {
        biased;
        () = kill_requested.cancelled() => Err(RunnerError::StartCancelled),
        accepted = handler.accept(options.connection_timeout, &mut exit_errors) => accepted,
    };

    match accepted {
        Ok(connection) => {
            logger.debug(&format!(
                "Runner '{}' with PID:{} connected",
                descriptor.id,
                process.pid()
            ));
            let mut runner = TestRunner::new(process, exit_errors, logger);
            runner.attach(connection);
            Ok(runner)
        }
        Err(err) => {
            logger.debug(&format!("Runner '{}' failed to start: {err}", descriptor.id));
            kill_and_reap(&process, logger.as_ref()).await;
            Err(err)
        }
    }
}

/// Load the runner for `language`, check it supports `current_version`, and
/// connect to it.
///
/// Nothing is spawned unless the descriptor loads and the version check
/// passes.
pub async fn start_runner(
    locator: &dyn DescriptorLocator,
    language: &str,
    current_version: &Version,
    options: &LaunchOptions,
    kill_requested: CancellationToken,
) -> Result<TestRunner, RunnerError> {
    let descriptor = load_descriptor(locator, language)?;
    descriptor.ensure_compatible(current_version)?;
    connect(&descriptor, options, kill_requested).await
}
