//! Config file discovery and environment overrides
//!
//! The file is found from an explicit path, `$STEPRUN_HOME`, or an upward
//! search for `.steprun/config.toml`; `GAUGE_PORT` and the timeout variables
//! are applied on top.

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;
use crate::model::{
    CONNECTION_TIMEOUT_ENV, Config, ConfigSource, GAUGE_PORT_ENV, KILL_TIMEOUT_ENV, RunnerConfig,
    STEPRUN_HOME_ENV,
};

/// TOML configuration file structure
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct TomlConfig {
    runner: Option<RunnerConfig>,
}

impl Config {
    /// Discover and load configuration from the process environment and the
    /// current working directory.
    pub fn discover(explicit_path: Option<&Path>) -> Result<Self, ConfigError> {
        let start_dir = std::env::current_dir().map_err(|source| ConfigError::Io {
            path: PathBuf::from("."),
            source,
        })?;
        Self::discover_from(&start_dir, explicit_path, |key| std::env::var(key).ok())
    }

    /// Discover and load configuration starting from a specific directory.
    ///
    /// Lookup order for the file: `explicit_path`, then
    /// `$STEPRUN_HOME/config.toml`, then `.steprun/config.toml` searched upward
    /// from `start_dir`. Environment overrides are applied on top and the
    /// result is validated.
    pub fn discover_from(
        start_dir: &Path,
        explicit_path: Option<&Path>,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let config_path = match explicit_path {
            Some(path) => Some(path.to_path_buf()),
            None => match env(STEPRUN_HOME_ENV) {
                Some(home) => {
                    let path = PathBuf::from(home).join("config.toml");
                    path.exists().then_some(path)
                }
                None => Self::discover_config_file_from(start_dir),
            },
        };

        let mut config = match config_path {
            Some(path) => Self::from_file(&path)?,
            None => Self::default(),
        };

        config.apply_env(&env)?;
        config.validate()?;
        Ok(config)
    }

    /// Search upward from `start_dir` for `.steprun/config.toml`, stopping at
    /// a repository root.
    #[must_use]
    pub fn discover_config_file_from(start_dir: &Path) -> Option<PathBuf> {
        let mut current_dir = start_dir;

        loop {
            let config_path = current_dir.join(".steprun").join("config.toml");
            if config_path.exists() {
                return Some(config_path);
            }

            if current_dir.join(".git").exists()
                || current_dir.join(".hg").exists()
                || current_dir.join(".svn").exists()
            {
                return None;
            }

            current_dir = current_dir.parent()?;
        }
    }

    /// Load configuration from a TOML file. The file must exist.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                ConfigError::NotFound {
                    path: path.to_path_buf(),
                }
            } else {
                ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                }
            }
        })?;

        let parsed: TomlConfig =
            toml::from_str(&content).map_err(|e| ConfigError::InvalidFile {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            runner: parsed.runner.unwrap_or_default(),
            source: ConfigSource::ConfigFile(path.to_path_buf()),
        })
    }

    fn apply_env(&mut self, env: &impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        // An unusable pre-negotiated port falls back to an OS-assigned one
        if let Some(port) = env(GAUGE_PORT_ENV).and_then(|raw| raw.trim().parse::<u16>().ok()) {
            self.runner.port = Some(port);
        }

        if let Some(raw) = env(CONNECTION_TIMEOUT_ENV) {
            self.runner.connection_timeout_ms = Some(parse_millis(CONNECTION_TIMEOUT_ENV, &raw)?);
        }

        if let Some(raw) = env(KILL_TIMEOUT_ENV) {
            self.runner.kill_timeout_ms = Some(parse_millis(KILL_TIMEOUT_ENV, &raw)?);
        }

        Ok(())
    }
}

fn parse_millis(key: &str, raw: &str) -> Result<u64, ConfigError> {
    raw.trim()
        .parse::<u64>()
        .map_err(|_| ConfigError::InvalidValue {
            key: key.to_string(),
            value: format!("expected milliseconds, got '{raw}'"),
        })
}
