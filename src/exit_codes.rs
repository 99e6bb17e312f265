//! Exit codes for the steprun CLI

use steprun_config::ConfigError;
use steprun_runner::RunnerError;

/// Process exit code.
///
/// Codes group failures by the stage that produced them, so scripts can tell
/// a missing runner from one that would not connect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExitCode(i32);

impl ExitCode {
    pub const SUCCESS: ExitCode = ExitCode(0);

    /// Internal error - general failure
    pub const INTERNAL: ExitCode = ExitCode(1);

    /// Bad configuration, or no usable runner descriptor
    pub const CONFIG: ExitCode = ExitCode(2);

    /// Runner does not support this framework version
    pub const INCOMPATIBLE: ExitCode = ExitCode(3);

    /// Runner command could not be resolved or spawned
    pub const LAUNCH: ExitCode = ExitCode(4);

    /// Runner failed to connect: timeout, early exit, or cancellation
    pub const HANDSHAKE: ExitCode = ExitCode(5);

    /// Runner could not be killed
    pub const FORCE_KILL: ExitCode = ExitCode(6);

    /// Use with `std::process::exit()`.
    #[must_use]
    pub const fn as_i32(self) -> i32 {
        self.0
    }
}

impl From<&RunnerError> for ExitCode {
    fn from(err: &RunnerError) -> Self {
        ExitCode(err.exit_code())
    }
}

impl From<&ConfigError> for ExitCode {
    fn from(_: &ConfigError) -> Self {
        ExitCode::CONFIG
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_runner_errors_map_to_stage_codes() {
        let cases = [
            (
                RunnerError::NotFound {
                    language: "ruby".into(),
                    reason: "missing".into(),
                },
                ExitCode::CONFIG,
            ),
            (
                RunnerError::UnsupportedPlatform { os: "plan9".into() },
                ExitCode::LAUNCH,
            ),
            (RunnerError::ConnectionTimeout { timeout_ms: 10 }, ExitCode::HANDSHAKE),
            (RunnerError::StartCancelled, ExitCode::HANDSHAKE),
            (
                RunnerError::ForceKill {
                    pid: 1,
                    source: std::io::Error::other("denied"),
                },
                ExitCode::FORCE_KILL,
            ),
        ];

        for (err, expected) in cases {
            assert_eq!(ExitCode::from(&err), expected, "{err}");
        }
    }

    #[test]
    fn test_config_errors_map_to_config_code() {
        let err = ConfigError::InvalidValue {
            key: "kill_timeout_ms".into(),
            value: "0".into(),
        };
        assert_eq!(ExitCode::from(&err), ExitCode::CONFIG);
    }
}
