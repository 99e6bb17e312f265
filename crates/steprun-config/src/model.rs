//! Configuration model and resolved runner settings

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Default time allowed for a runner to connect back, in milliseconds
pub const DEFAULT_CONNECTION_TIMEOUT_MS: u64 = 30_000;

/// Default grace period between the stop request and a forced kill, in milliseconds
pub const DEFAULT_KILL_TIMEOUT_MS: u64 = 4_000;

/// Default interval of the liveness poll during termination, in milliseconds
pub const DEFAULT_KILL_POLL_INTERVAL_MS: u64 = 100;

/// Environment variable carrying a pre-negotiated listener port
pub const GAUGE_PORT_ENV: &str = "GAUGE_PORT";

/// Environment overrides for the two timeouts, in milliseconds
pub const CONNECTION_TIMEOUT_ENV: &str = "runner_connection_timeout";
pub const KILL_TIMEOUT_ENV: &str = "plugin_kill_timeout";

/// Directory holding `config.toml`, overriding discovery
pub const STEPRUN_HOME_ENV: &str = "STEPRUN_HOME";

/// Gauge installation root; plugins live under `<GAUGE_HOME>/plugins`
pub const GAUGE_HOME_ENV: &str = "GAUGE_HOME";

/// Where a configuration value came from
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ConfigSource {
    #[default]
    Default,
    ConfigFile(PathBuf),
}

/// `[runner]` section of the config file
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RunnerConfig {
    pub connection_timeout_ms: Option<u64>,
    pub kill_timeout_ms: Option<u64>,
    pub kill_poll_interval_ms: Option<u64>,
    /// Fixed listener port; 0 or absent lets the OS choose
    pub port: Option<u16>,
    pub plugins_dir: Option<PathBuf>,
}

/// Configuration for steprun operations.
///
/// Use [`Config::discover`] for CLI behaviour, or [`Config::discover_from`]
/// with an explicit directory and environment for deterministic tests.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Config {
    pub runner: RunnerConfig,
    pub source: ConfigSource,
}

/// Resolved runner timings and locations, all defaults applied
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunnerSettings {
    pub connection_timeout: Duration,
    pub kill_timeout: Duration,
    pub kill_poll_interval: Duration,
    pub port: Option<u16>,
    pub plugins_dir: Option<PathBuf>,
}

impl Config {
    /// Resolve the `[runner]` section into concrete settings.
    ///
    /// `plugins_dir` falls back to `<GAUGE_HOME>/plugins`, then `~/.gauge/plugins`.
    #[must_use]
    pub fn runner_settings(&self, env: impl Fn(&str) -> Option<String>) -> RunnerSettings {
        let runner = &self.runner;
        RunnerSettings {
            connection_timeout: Duration::from_millis(
                runner
                    .connection_timeout_ms
                    .unwrap_or(DEFAULT_CONNECTION_TIMEOUT_MS),
            ),
            kill_timeout: Duration::from_millis(
                runner.kill_timeout_ms.unwrap_or(DEFAULT_KILL_TIMEOUT_MS),
            ),
            kill_poll_interval: Duration::from_millis(
                runner
                    .kill_poll_interval_ms
                    .unwrap_or(DEFAULT_KILL_POLL_INTERVAL_MS),
            ),
            port: runner.port.filter(|port| *port != 0),
            plugins_dir: runner
                .plugins_dir
                .clone()
                .or_else(|| env(GAUGE_HOME_ENV).map(|home| PathBuf::from(home).join("plugins")))
                .or_else(|| dirs::home_dir().map(|home| home.join(".gauge").join("plugins"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn test_defaults() {
        let settings = Config::default().runner_settings(no_env);
        assert_eq!(settings.connection_timeout, Duration::from_secs(30));
        assert_eq!(settings.kill_timeout, Duration::from_secs(4));
        assert_eq!(settings.kill_poll_interval, Duration::from_millis(100));
        assert_eq!(settings.port, None);
    }

    #[test]
    fn test_zero_port_means_os_assigned() {
        let config = Config {
            runner: RunnerConfig {
                port: Some(0),
                ..RunnerConfig::default()
            },
            ..Config::default()
        };
        assert_eq!(config.runner_settings(no_env).port, None);
    }

    #[test]
    fn test_plugins_dir_precedence() {
        let gauge_home = |key: &str| (key == GAUGE_HOME_ENV).then(|| "/opt/gauge".to_string());

        let settings = Config::default().runner_settings(gauge_home);
        assert_eq!(settings.plugins_dir, Some(PathBuf::from("/opt/gauge/plugins")));

        let explicit = Config {
            runner: RunnerConfig {
                plugins_dir: Some(PathBuf::from("/srv/plugins")),
                ..RunnerConfig::default()
            },
            ..Config::default()
        };
        assert_eq!(
            explicit.runner_settings(gauge_home).plugins_dir,
            Some(PathBuf::from("/srv/plugins"))
        );
    }
}
