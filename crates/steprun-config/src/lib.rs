//! Configuration management for steprun
//!
//! Hierarchical configuration with precedence: environment > config file >
//! built-in defaults. The file is TOML with a single `[runner]` section:
//!
//! ```toml
//! [runner]
//! connection_timeout_ms = 30000
//! kill_timeout_ms = 4000
//! kill_poll_interval_ms = 100
//! plugins_dir = "/opt/gauge/plugins"
//! ```

mod discovery;
pub mod error;
mod model;
mod validation;

pub use error::ConfigError;
pub use model::*;
