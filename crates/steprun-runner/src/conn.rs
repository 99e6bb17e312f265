//! Loopback listener for the runner's connect-back

use std::net::Ipv4Addr;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;

use crate::error::RunnerError;

/// Loopback listener a runner connects back to.
#[derive(Debug)]
pub struct ConnectionHandler {
    listener: TcpListener,
    port: u16,
}

impl ConnectionHandler {
    /// Bind on `127.0.0.1:port`; 0 lets the OS pick.
    pub async fn bind(port: u16) -> Result<Self, RunnerError> {
        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, port))
            .await
            .map_err(|source| RunnerError::Bind { port, source })?;
        let port = listener
            .local_addr()
            .map_err(|source| RunnerError::Bind { port, source })?
            .port();
        Ok(Self { listener, port })
    }

    #[must_use]
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Wait for the runner to connect.
    ///
    /// Fails with the runner's exit error if it dies first, or with
    /// [`RunnerError::ConnectionTimeout`] once `timeout` elapses. The listener
    /// is closed on return either way.
    pub async fn accept(
        self,
        timeout: Duration,
        exit_errors: &mut oneshot::Receiver<RunnerError>,
    ) -> Result<TcpStream, RunnerError> {
        // A runner that connects and then exits still counts as connected
        tokio::select! {
            biased;
            accepted = self.listener.accept() => {
                accepted
                    .map(|(stream, _)| stream)
                    .map_err(RunnerError::Connection)
            }
            exit = exit_errors => Err(exit.unwrap_or_else(|_| RunnerError::ProcessExit {
                reason: "runner exited before connecting".to_string(),
            })),
            () = tokio::time::sleep(timeout) => Err(RunnerError::ConnectionTimeout {
                timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            }),
        }
    }
}
