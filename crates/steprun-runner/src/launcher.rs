//! Spawning a runner and supervising its process
//!
//! The spawned [`Child`] is owned by a single supervisor task. That task reaps
//! the process, serves force-kill requests from the [`ProcessHandle`], kills
//! the process when the caller's kill token fires, and publishes the exit
//! status. An unsuccessful exit is also delivered once on the exit-error
//! channel returned by [`launch`].

use std::ffi::OsString;
use std::io;
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use steprun_utils::Logger;
use tokio::process::Child;
use tokio::sync::{mpsc, oneshot, watch};
use tokio_util::sync::CancellationToken;

use crate::command_spec::CommandSpec;
use crate::descriptor::RunnerDescriptor;
use crate::error::RunnerError;
use crate::output::{OutputSink, OutputStream, forward_lines};
use crate::platform::Platform;

/// Variable through which a runner learns the port to connect back to
pub const GAUGE_INTERNAL_PORT_ENV: &str = "GAUGE_INTERNAL_PORT";

/// Lifecycle of the supervised OS process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    Running,
    /// Reaped; `None` when waiting on the process itself failed
    Exited(Option<ExitStatus>),
}

type KillReply = oneshot::Sender<io::Result<()>>;

/// Handle to a launched runner process.
///
/// Cloning is cheap; every clone observes the same process.
#[derive(Debug, Clone)]
pub struct ProcessHandle {
    pid: u32,
    state: watch::Receiver<ProcessState>,
    kill_requests: mpsc::UnboundedSender<KillReply>,
}

impl ProcessHandle {
    #[must_use]
    pub fn pid(&self) -> u32 {
        self.pid
    }

    #[must_use]
    pub fn state(&self) -> ProcessState {
        *self.state.borrow()
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.state() == ProcessState::Running
    }

    /// Exit status once reaped
    #[must_use]
    pub fn exit_status(&self) -> Option<ExitStatus> {
        match self.state() {
            ProcessState::Running => None,
            ProcessState::Exited(status) => status,
        }
    }

    /// Wait until the process has been reaped.
    pub async fn wait_for_exit(&self) -> Option<ExitStatus> {
        let mut state = self.state.clone();
        match state
            .wait_for(|s| *s != ProcessState::Running)
            .await
            .map(|s| *s)
        {
            Ok(ProcessState::Exited(status)) => status,
            _ => None,
        }
    }

    /// Kill the process at the OS level.
    ///
    /// Does not wait for exit. Succeeds without doing anything when the
    /// process has already been reaped.
    pub async fn force_kill(&self) -> io::Result<()> {
        if !self.is_running() {
            return Ok(());
        }

        let (reply_tx, reply_rx) = oneshot::channel();
        if self.kill_requests.send(reply_tx).is_err() {
            return Ok(());
        }
        // A dropped reply means the supervisor reaped the process first
        reply_rx.await.unwrap_or(Ok(()))
    }
}

/// Environment for the runner: `inherited` with `GAUGE_INTERNAL_PORT` set to
/// `port`.
///
/// An existing entry (matched on the trimmed key) is rewritten in place and
/// any repeats of it are dropped; otherwise the entry is appended. All other
/// entries keep their order.
#[must_use]
pub fn build_child_env<I, K, V>(port: u16, inherited: I) -> Vec<(OsString, OsString)>
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<OsString>,
    V: Into<OsString>,
{
    let port = OsString::from(port.to_string());
    let mut seen = false;
    let mut env = Vec::new();

    for (key, value) in inherited {
        let key = key.into();
        if key.to_string_lossy().trim() == GAUGE_INTERNAL_PORT_ENV {
            if !seen {
                env.push((OsString::from(GAUGE_INTERNAL_PORT_ENV), port.clone()));
                seen = true;
            }
        } else {
            env.push((key, value.into()));
        }
    }

    if !seen {
        env.push((OsString::from(GAUGE_INTERNAL_PORT_ENV), port));
    }
    env
}

/// Resolve the full command for starting `descriptor` on `platform`.
pub fn plan_launch<I, K, V>(
    descriptor: &RunnerDescriptor,
    platform: Platform,
    port: u16,
    inherited: I,
) -> Result<CommandSpec, RunnerError>
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<OsString>,
    V: Into<OsString>,
{
    Ok(descriptor
        .run_command(platform)?
        .exact_env(build_child_env(port, inherited)))
}

/// Start the runner described by `descriptor`, telling it to connect to
/// `port`.
///
/// Must be called from within a tokio runtime. Output lines go to `sink`.
/// Cancelling `kill_requested` at any point kills the process.
pub fn launch(
    descriptor: &RunnerDescriptor,
    port: u16,
    sink: Arc<dyn OutputSink>,
    kill_requested: CancellationToken,
    logger: Arc<dyn Logger>,
) -> Result<(ProcessHandle, oneshot::Receiver<RunnerError>), RunnerError> {
    let spec = plan_launch(descriptor, Platform::current()?, port, std::env::vars_os())?;
    spawn_supervised(&spec, sink, kill_requested, logger)
}

pub(crate) fn spawn_supervised(
    spec: &CommandSpec,
    sink: Arc<dyn OutputSink>,
    kill_requested: CancellationToken,
    logger: Arc<dyn Logger>,
) -> Result<(ProcessHandle, oneshot::Receiver<RunnerError>), RunnerError> {
    let mut cmd = spec.to_tokio_command();
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = cmd.spawn().map_err(|e| RunnerError::Launch {
        command: spec.display(),
        reason: e.to_string(),
    })?;

    let Some(pid) = child.id() else {
        return Err(RunnerError::Launch {
            command: spec.display(),
            reason: "process exited before its PID could be read".to_string(),
        });
    };
    logger.debug(&format!("Started runner '{}' with PID:{pid}", spec.display()));

    if let Some(stdout) = child.stdout.take() {
        forward_lines(stdout, OutputStream::Stdout, sink.clone());
    }
    if let Some(stderr) = child.stderr.take() {
        forward_lines(stderr, OutputStream::Stderr, sink);
    }

    let (state_tx, state_rx) = watch::channel(ProcessState::Running);
    let (kill_tx, kill_rx) = mpsc::unbounded_channel();
    let (exit_tx, exit_rx) = oneshot::channel();

    tokio::spawn(supervise(
        child,
        pid,
        kill_requested,
        kill_rx,
        state_tx,
        exit_tx,
        logger,
    ));

    Ok((
        ProcessHandle {
            pid,
            state: state_rx,
            kill_requests: kill_tx,
        },
        exit_rx,
    ))
}

async fn supervise(
    mut child: Child,
    pid: u32,
    kill_requested: CancellationToken,
    mut kill_requests: mpsc::UnboundedReceiver<KillReply>,
    state: watch::Sender<ProcessState>,
    exit_errors: oneshot::Sender<RunnerError>,
    logger: Arc<dyn Logger>,
) {
    let mut kill_watch_armed = true;

    let waited = loop {
        tokio::select! {
            waited = child.wait() => break waited,
            () = kill_requested.cancelled(), if kill_watch_armed => {
                kill_watch_armed = false;
                logger.debug(&format!("Kill requested for runner with PID:{pid}"));
                if let Err(e) = child.start_kill() {
                    logger.debug(&format!("Failed to kill runner with PID:{pid}: {e}"));
                }
            }
            Some(reply) = kill_requests.recv() => {
                let _ = reply.send(child.start_kill());
            }
        }
    };

    let failure = match &waited {
        Ok(status) if status.success() => None,
        Ok(status) => Some(status.to_string()),
        Err(e) => Some(e.to_string()),
    };
    // The error is queued before the exit is published, so anyone who has
    // observed the exit can also find the error.
    if let Some(reason) = failure {
        logger.debug(&format!("Runner with PID:{pid} exited with error: {reason}"));
        let _ = exit_errors.send(RunnerError::ProcessExit { reason });
    }
    state.send_replace(ProcessState::Exited(waited.ok()));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::BufferedSink;
    use crate::platform::PlatformCommands;
    use std::path::PathBuf;
    use std::time::Duration;
    use steprun_utils::TracingLogger;
    use steprun_utils::version::VersionSupport;

    fn descriptor(tokens: &[&str], dir: PathBuf) -> RunnerDescriptor {
        let tokens: Vec<String> = tokens.iter().map(|t| (*t).to_string()).collect();
        RunnerDescriptor {
            id: "ruby".to_string(),
            name: "Ruby".to_string(),
            version: "1.0.0".to_string(),
            description: String::new(),
            run: PlatformCommands {
                windows: tokens.clone(),
                linux: tokens.clone(),
                darwin: tokens,
            },
            init: PlatformCommands::default(),
            lib: String::new(),
            gauge_version_support: VersionSupport::default(),
            dir,
        }
    }

    fn env(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    fn port_entries(env: &[(OsString, OsString)]) -> Vec<&OsString> {
        env.iter()
            .filter(|(k, _)| k == GAUGE_INTERNAL_PORT_ENV)
            .map(|(_, v)| v)
            .collect()
    }

    #[test]
    fn test_child_env_appends_port() {
        let built = build_child_env(7777, env(&[("PATH", "/usr/bin"), ("HOME", "/home/u")]));
        assert_eq!(built.len(), 3);
        assert_eq!(built[0], ("PATH".into(), "/usr/bin".into()));
        assert_eq!(built[1], ("HOME".into(), "/home/u".into()));
        assert_eq!(port_entries(&built), vec!["7777"]);
    }

    #[test]
    fn test_child_env_rewrites_existing_port_in_place() {
        let built = build_child_env(
            7777,
            env(&[("A", "1"), ("GAUGE_INTERNAL_PORT", "9999"), ("B", "2")]),
        );
        assert_eq!(
            built,
            vec![
                ("A".into(), "1".into()),
                ("GAUGE_INTERNAL_PORT".into(), "7777".into()),
                ("B".into(), "2".into()),
            ]
        );
    }

    #[test]
    fn test_child_env_matches_padded_key_and_drops_repeats() {
        let built = build_child_env(
            7777,
            env(&[(" GAUGE_INTERNAL_PORT ", "1"), ("GAUGE_INTERNAL_PORT", "2")]),
        );
        assert_eq!(built, vec![("GAUGE_INTERNAL_PORT".into(), "7777".into())]);
    }

    #[test]
    fn test_plan_launch_for_ruby_runner() {
        let dir = PathBuf::from("/plugins/ruby/1.0.0");
        let mut ruby = descriptor(&["ruby", "run.rb"], dir.clone());
        ruby.gauge_version_support = VersionSupport {
            minimum: "0.5.0".to_string(),
            maximum: "2.0.0".to_string(),
        };
        ruby.ensure_compatible(&steprun_utils::Version::new(1, 0, 0)).unwrap();

        let spec = plan_launch(
            &ruby,
            Platform::Linux,
            7777,
            env(&[("PATH", "/usr/bin")]),
        )
        .unwrap();

        assert_eq!(spec.program, OsString::from("ruby"));
        assert_eq!(spec.args, vec![OsString::from("run.rb")]);
        assert_eq!(spec.cwd, Some(dir));
        assert_eq!(port_entries(spec.env.as_deref().unwrap()), vec!["7777"]);
    }

    #[test]
    fn test_plan_launch_without_command() {
        let err = plan_launch(
            &descriptor(&[], PathBuf::from("/plugins/ruby")),
            Platform::Linux,
            7777,
            env(&[]),
        )
        .unwrap_err();
        assert!(matches!(err, RunnerError::MissingCommand { phase: "run", .. }));
    }

    #[tokio::test]
    async fn test_launch_failure_is_reported() {
        let spec = CommandSpec::new("steprun-definitely-not-a-program");
        let err = spawn_supervised(
            &spec,
            Arc::new(BufferedSink::new()),
            CancellationToken::new(),
            Arc::new(TracingLogger),
        )
        .unwrap_err();
        assert!(matches!(err, RunnerError::Launch { ref command, .. } if command == "steprun-definitely-not-a-program"));
    }

    #[cfg(unix)]
    mod unix {
        use super::*;

        fn spawn(script: &str, sink: Arc<BufferedSink>, kill: CancellationToken) -> (ProcessHandle, oneshot::Receiver<RunnerError>) {
            let spec = CommandSpec::new("sh").arg("-c").arg(script);
            spawn_supervised(&spec, sink, kill, Arc::new(TracingLogger)).unwrap()
        }

        #[tokio::test]
        async fn test_clean_exit_sends_no_error() {
            let (process, exit_errors) = spawn("exit 0", Arc::new(BufferedSink::new()), CancellationToken::new());

            let status = process.wait_for_exit().await.unwrap();
            assert!(status.success());
            assert!(!process.is_running());
            assert!(exit_errors.await.is_err());
        }

        #[tokio::test]
        async fn test_failed_exit_sends_one_error() {
            let (process, exit_errors) = spawn("exit 3", Arc::new(BufferedSink::new()), CancellationToken::new());

            let err = exit_errors.await.unwrap();
            assert!(matches!(err, RunnerError::ProcessExit { .. }));
            assert_eq!(process.exit_status().and_then(|s| s.code()), Some(3));
        }

        #[tokio::test]
        async fn test_output_is_forwarded() {
            let sink = Arc::new(BufferedSink::new());
            let (process, _exit) = spawn("echo out; echo err >&2", sink.clone(), CancellationToken::new());
            process.wait_for_exit().await;
            tokio::time::sleep(Duration::from_millis(50)).await;

            let lines = sink.lines();
            assert!(lines.contains(&(OutputStream::Stdout, "out".to_string())));
            assert!(lines.contains(&(OutputStream::Stderr, "err".to_string())));
        }

        #[tokio::test]
        async fn test_kill_token_kills_process() {
            let kill = CancellationToken::new();
            let (process, exit_errors) = spawn("exec sleep 30", Arc::new(BufferedSink::new()), kill.clone());
            assert!(process.is_running());

            kill.cancel();
            let status = tokio::time::timeout(Duration::from_secs(5), process.wait_for_exit())
                .await
                .unwrap();
            assert!(status.is_some_and(|s| !s.success()));
            assert!(matches!(exit_errors.await, Ok(RunnerError::ProcessExit { .. })));
        }

        #[tokio::test]
        async fn test_force_kill_then_again_after_exit() {
            let (process, _exit) = spawn("exec sleep 30", Arc::new(BufferedSink::new()), CancellationToken::new());

            process.force_kill().await.unwrap();
            tokio::time::timeout(Duration::from_secs(5), process.wait_for_exit())
                .await
                .unwrap();
            assert!(!process.is_running());
            process.force_kill().await.unwrap();
        }
    }
}
