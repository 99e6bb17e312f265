use crate::error::ConfigError;
use crate::model::{Config, DEFAULT_KILL_POLL_INTERVAL_MS, DEFAULT_KILL_TIMEOUT_MS};

impl Config {
    /// Validate configuration values
    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        let runner = &self.runner;

        for (key, value) in [
            ("connection_timeout_ms", runner.connection_timeout_ms),
            ("kill_timeout_ms", runner.kill_timeout_ms),
            ("kill_poll_interval_ms", runner.kill_poll_interval_ms),
        ] {
            if value == Some(0) {
                return Err(ConfigError::InvalidValue {
                    key: key.to_string(),
                    value: "must be greater than 0".to_string(),
                });
            }
        }

        let kill_timeout = runner.kill_timeout_ms.unwrap_or(DEFAULT_KILL_TIMEOUT_MS);
        let poll_interval = runner
            .kill_poll_interval_ms
            .unwrap_or(DEFAULT_KILL_POLL_INTERVAL_MS);
        if poll_interval >= kill_timeout {
            return Err(ConfigError::InvalidValue {
                key: "kill_poll_interval_ms".to_string(),
                value: format!("must be shorter than kill_timeout_ms ({kill_timeout})"),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RunnerConfig;

    fn with_runner(runner: RunnerConfig) -> Config {
        Config {
            runner,
            ..Config::default()
        }
    }

    #[test]
    fn test_defaults_are_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_zero_durations_rejected() {
        let config = with_runner(RunnerConfig {
            connection_timeout_ms: Some(0),
            ..RunnerConfig::default()
        });
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("connection_timeout_ms"));
    }

    #[test]
    fn test_poll_interval_must_be_shorter_than_kill_timeout() {
        let config = with_runner(RunnerConfig {
            kill_timeout_ms: Some(50),
            kill_poll_interval_ms: Some(50),
            ..RunnerConfig::default()
        });
        assert!(config.validate().is_err());

        let config = with_runner(RunnerConfig {
            kill_timeout_ms: Some(50),
            kill_poll_interval_ms: Some(10),
            ..RunnerConfig::default()
        });
        assert!(config.validate().is_ok());
    }
}
