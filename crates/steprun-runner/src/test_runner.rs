//! The connected runner and its graceful-then-forced shutdown

use std::sync::Arc;
use std::time::Duration;
use steprun_utils::Logger;
use tokio::net::TcpStream;
use tokio::sync::oneshot;
use tokio::time::MissedTickBehavior;

use crate::error::RunnerError;
use crate::launcher::ProcessHandle;
use crate::message::{Message, write_message};

/// How long a killed runner is given to be reaped
pub(crate) const CLEANUP_WAIT: Duration = Duration::from_secs(5);

/// Floor for the exit poll; `interval` rejects a zero period
const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Lifecycle of a [`TestRunner`]. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RunnerState {
    Starting,
    Live,
    Terminating,
    Dead,
}

/// A runner process together with its connection.
pub struct TestRunner {
    process: ProcessHandle,
    connection: Option<TcpStream>,
    exit_errors: Option<oneshot::Receiver<RunnerError>>,
    state: RunnerState,
    logger: Arc<dyn Logger>,
}

impl std::fmt::Debug for TestRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TestRunner")
            .field("pid", &self.process.pid())
            .field("state", &self.state)
            .field("connected", &self.connection.is_some())
            .finish_non_exhaustive()
    }
}

impl TestRunner {
    pub(crate) fn new(
        process: ProcessHandle,
        exit_errors: oneshot::Receiver<RunnerError>,
        logger: Arc<dyn Logger>,
    ) -> Self {
        Self {
            process,
            connection: None,
            exit_errors: Some(exit_errors),
            state: RunnerState::Starting,
            logger,
        }
    }

    /// Attach the accepted connection; the runner becomes live.
    pub(crate) fn attach(&mut self, connection: TcpStream) {
        self.connection = Some(connection);
        self.advance(RunnerState::Live);
    }

    fn advance(&mut self, next: RunnerState) {
        if next > self.state {
            self.state = next;
        }
    }

    #[must_use]
    pub fn state(&self) -> RunnerState {
        self.state
    }

    #[must_use]
    pub fn pid(&self) -> u32 {
        self.process.pid()
    }

    #[must_use]
    pub fn process(&self) -> &ProcessHandle {
        &self.process
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.process.is_running()
    }

    /// The runner connection while the runner is live
    pub fn connection_mut(&mut self) -> Option<&mut TcpStream> {
        self.connection.as_mut()
    }

    /// Exit error if the runner has already died unsuccessfully.
    pub fn take_exit_error(&mut self) -> Option<RunnerError> {
        let mut errors = self.exit_errors.take()?;
        match errors.try_recv() {
            Ok(err) => Some(err),
            Err(oneshot::error::TryRecvError::Empty) => {
                self.exit_errors = Some(errors);
                None
            }
            Err(oneshot::error::TryRecvError::Closed) => None,
        }
    }

    /// Hand over the exit-error channel, for callers that want to be told
    /// about a crash after the handshake.
    pub fn take_exit_errors(&mut self) -> Option<oneshot::Receiver<RunnerError>> {
        self.exit_errors.take()
    }

    /// Ask the runner to shut down, killing it if it is still alive after
    /// `grace_period`.
    ///
    /// The liveness check runs every `poll_interval`. Stopping a runner that
    /// has already exited succeeds without sending anything, so repeated calls
    /// are harmless. Only a failed OS-level kill is reported.
    pub async fn stop(
        &mut self,
        grace_period: Duration,
        poll_interval: Duration,
    ) -> Result<(), RunnerError> {
        if self.state == RunnerState::Dead || !self.process.is_running() {
            self.connection = None;
            self.advance(RunnerState::Dead);
            return Ok(());
        }

        self.advance(RunnerState::Terminating);
        self.send_kill_request(grace_period).await;

        let outcome = tokio::select! {
            () = wait_until_exited(&self.process, poll_interval) => Ok(()),
            () = tokio::time::sleep(grace_period) => {
                let pid = self.process.pid();
                self.logger.warning(&format!("Killing runner with PID:{pid} forcefully"));
                self.process
                    .force_kill()
                    .await
                    .map_err(|source| RunnerError::ForceKill { pid, source })
            }
        };

        if outcome.is_ok()
            && tokio::time::timeout(CLEANUP_WAIT, self.process.wait_for_exit())
                .await
                .is_err()
        {
            self.logger.debug(&format!(
                "Runner with PID:{} not yet reaped after kill",
                self.process.pid()
            ));
        }

        self.connection = None;
        self.advance(RunnerState::Dead);
        outcome
    }

    /// Kill without asking first and wait a bounded time for the process to
    /// be reaped.
    pub(crate) async fn kill(&mut self) {
        kill_and_reap(&self.process, self.logger.as_ref()).await;
        self.connection = None;
        self.advance(RunnerState::Dead);
    }

    async fn send_kill_request(&mut self, bound: Duration) {
        let Some(connection) = self.connection.as_mut() else {
            return;
        };
        let message = Message::kill_process_request();
        match tokio::time::timeout(bound, write_message(connection, &message)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => self
                .logger
                .debug(&format!("Failed to send kill request to runner: {e}")),
            Err(_) => self.logger.debug("Timed out sending kill request to runner"),
        }
    }
}

/// Resolve once the process is observed to have exited.
async fn wait_until_exited(process: &ProcessHandle, poll_interval: Duration) {
    let mut ticker = tokio::time::interval(poll_interval.max(MIN_POLL_INTERVAL));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        if !process.is_running() {
            return;
        }
    }
}

pub(crate) async fn kill_and_reap(process: &ProcessHandle, logger: &dyn Logger) {
    if let Err(e) = process.force_kill().await {
        logger.debug(&format!(
            "Failed to kill runner with PID:{}: {e}",
            process.pid()
        ));
    }
    if tokio::time::timeout(CLEANUP_WAIT, process.wait_for_exit())
        .await
        .is_err()
    {
        logger.warning(&format!(
            "Runner with PID:{} did not exit after being killed",
            process.pid()
        ));
    }
}
