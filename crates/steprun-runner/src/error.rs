//! Error types for runner launch and supervision

use std::io;
use std::path::PathBuf;
use steprun_utils::version::{CompatibilityError, Version};
use thiserror::Error;

use crate::platform::Platform;

/// Errors raised while loading, starting, or stopping a step runner.
///
/// Descriptor and compatibility errors are raised before any process is
/// spawned. Launch and handshake errors are raised only after the partially
/// started process has been killed, so callers never need to clean up after a
/// failed start. [`RunnerError::ForceKill`] is the only failure `stop` reports.
#[derive(Error, Debug)]
pub enum RunnerError {
    #[error("No runner descriptor found for language '{language}': {reason}")]
    NotFound { language: String, reason: String },

    #[error("Failed to parse runner descriptor {path}: {reason}")]
    Parse { path: PathBuf, reason: String },

    #[error(
        "Compatible {runner} version to {current} not found. To update plugin, run `gauge --update {runner}`. ({source})"
    )]
    IncompatibleVersion {
        runner: String,
        current: Version,
        #[source]
        source: CompatibilityError,
    },

    #[error("Unsupported platform '{os}': runners declare commands for windows, linux and darwin")]
    UnsupportedPlatform { os: String },

    #[error("Runner '{runner}' declares no {phase} command for {platform}")]
    MissingCommand {
        runner: String,
        phase: &'static str,
        platform: Platform,
    },

    #[error("Failed to launch runner command '{command}': {reason}")]
    Launch { command: String, reason: String },

    #[error("Failed to open runner listener on port {port}: {source}")]
    Bind {
        port: u16,
        #[source]
        source: io::Error,
    },

    #[error("Runner connection failed: {0}")]
    Connection(#[source] io::Error),

    #[error("Timed out after {timeout_ms}ms waiting for the runner to connect")]
    ConnectionTimeout { timeout_ms: u64 },

    #[error("Runner exited with error: {reason}")]
    ProcessExit { reason: String },

    #[error("Runner start was cancelled before the connection was established")]
    StartCancelled,

    #[error("Failed to kill runner with PID {pid}: {source}")]
    ForceKill {
        pid: u32,
        #[source]
        source: io::Error,
    },

    #[error("Runner init hook failed: {status}")]
    InitHookFailed {
        status: String,
        exit_code: Option<i32>,
    },
}

impl RunnerError {
    /// Process exit code the CLI reports for this error.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::NotFound { .. } | Self::Parse { .. } => 2,
            Self::IncompatibleVersion { .. } => 3,
            Self::UnsupportedPlatform { .. } | Self::MissingCommand { .. } | Self::Launch { .. } => 4,
            Self::Bind { .. }
            | Self::Connection(_)
            | Self::ConnectionTimeout { .. }
            | Self::ProcessExit { .. }
            | Self::StartCancelled => 5,
            Self::ForceKill { .. } => 6,
            Self::InitHookFailed { exit_code, .. } => exit_code.filter(|code| *code != 0).unwrap_or(1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use steprun_utils::version::{VersionSupport, check_compatibility};

    #[test]
    fn test_incompatible_version_message_carries_remediation_hint() {
        let current = Version::new(1, 0, 0);
        let source = check_compatibility(
            &current,
            &VersionSupport {
                minimum: "2.0.0".to_string(),
                maximum: "3.0.0".to_string(),
            },
        )
        .unwrap_err();

        let err = RunnerError::IncompatibleVersion {
            runner: "ruby".to_string(),
            current,
            source,
        };
        let message = err.to_string();
        assert!(message.contains("Compatible ruby version to 1.0.0 not found"));
        assert!(message.contains("gauge --update ruby"));
        assert!(message.contains("not between 2.0.0 and 3.0.0"));
    }

    #[test]
    fn test_exit_codes_group_by_stage() {
        assert_eq!(
            RunnerError::NotFound {
                language: "x".into(),
                reason: "missing".into()
            }
            .exit_code(),
            2
        );
        assert_eq!(RunnerError::StartCancelled.exit_code(), 5);
        assert_eq!(RunnerError::ConnectionTimeout { timeout_ms: 50 }.exit_code(), 5);
        assert_eq!(
            RunnerError::InitHookFailed {
                status: "exit status: 7".into(),
                exit_code: Some(7)
            }
            .exit_code(),
            7
        );
        assert_eq!(
            RunnerError::InitHookFailed {
                status: "signal: 9".into(),
                exit_code: None
            }
            .exit_code(),
            1
        );
    }
}
