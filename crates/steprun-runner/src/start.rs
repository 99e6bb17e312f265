//! Starting a runner on a background task with a cancel handle

use std::sync::Arc;
use steprun_utils::version::Version;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use crate::descriptor::DescriptorLocator;
use crate::error::RunnerError;
use crate::handshake::{LaunchOptions, start_runner};
use crate::test_runner::TestRunner;

/// A runner start running in the background.
///
/// Exactly one of `runner` and `error` receives a value. Cancelling `kill`
/// before the runner connects aborts the start with
/// [`RunnerError::StartCancelled`]; cancelling it afterwards kills the runner.
#[derive(Debug)]
pub struct StartChannels {
    pub runner: oneshot::Receiver<TestRunner>,
    pub error: oneshot::Receiver<RunnerError>,
    pub kill: CancellationToken,
}

impl StartChannels {
    /// Begin starting the runner for `language` on a background task.
    pub fn spawn(
        locator: Arc<dyn DescriptorLocator>,
        language: impl Into<String>,
        current_version: Version,
        options: LaunchOptions,
    ) -> Self {
        let language = language.into();
        let (runner_tx, runner_rx) = oneshot::channel();
        let (error_tx, error_rx) = oneshot::channel();
        let kill = CancellationToken::new();
        let kill_requested = kill.clone();

        tokio::spawn(async move {
            match start_runner(
                locator.as_ref(),
                &language,
                &current_version,
                &options,
                kill_requested,
            )
            .await
            {
                Ok(runner) => {
                    if let Err(mut orphan) = runner_tx.send(runner) {
                        orphan.kill().await;
                    }
                }
                Err(err) => {
                    let _ = error_tx.send(err);
                }
            }
        });

        Self {
            runner: runner_rx,
            error: error_rx,
            kill,
        }
    }

    /// Abort the start, or kill the runner if it already connected.
    pub fn cancel(&self) {
        self.kill.cancel();
    }

    /// Wait for whichever outcome arrives.
    pub async fn wait(self) -> Result<TestRunner, RunnerError> {
        let Self { runner, error, .. } = self;
        tokio::select! {
            Ok(started) = runner => Ok(started),
            Ok(err) = error => Err(err),
            else => Err(RunnerError::StartCancelled),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::PluginDirLocator;
    use std::time::Duration;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_error_arrives_on_error_channel() {
        let temp = TempDir::new().unwrap();
        let channels = StartChannels::spawn(
            Arc::new(PluginDirLocator::new(temp.path())),
            "ruby",
            Version::new(1, 0, 0),
            LaunchOptions::new(Duration::from_secs(1)),
        );

        let err = channels.wait().await.unwrap_err();
        assert!(matches!(err, RunnerError::NotFound { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_cancel_aborts_pending_start() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("ruby");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(
            dir.join("ruby.json"),
            r#"{
                "id": "ruby", "name": "Ruby", "version": "1.0.0",
                "run": { "linux": ["sleep", "30"], "darwin": ["sleep", "30"] },
                "gaugeVersionSupport": { "minimum": "0.0.1" }
            }"#,
        )
        .unwrap();

        let channels = StartChannels::spawn(
            Arc::new(PluginDirLocator::new(temp.path())),
            "ruby",
            Version::new(1, 0, 0),
            LaunchOptions::new(Duration::from_secs(30)),
        );
        tokio::time::sleep(Duration::from_millis(100)).await;
        channels.cancel();

        let err = tokio::time::timeout(Duration::from_secs(10), channels.wait())
            .await
            .unwrap()
            .unwrap_err();
        assert!(matches!(err, RunnerError::StartCancelled));
    }
}
