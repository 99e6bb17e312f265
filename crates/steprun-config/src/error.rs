use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found at {path}")]
    NotFound { path: PathBuf },

    #[error("Failed to read configuration file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid configuration file {path}: {reason}")]
    InvalidFile { path: PathBuf, reason: String },

    #[error("Invalid configuration value for {key}: {value}")]
    InvalidValue { key: String, value: String },
}
