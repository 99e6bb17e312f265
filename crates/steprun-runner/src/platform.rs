//! Host platform detection and per-platform command lists

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::RunnerError;

/// Operating system family a runner descriptor declares commands for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Platform {
    Windows,
    Linux,
    Darwin,
}

/// Host OS identifiers recognised by [`Platform::from_os`]
const PLATFORM_TABLE: &[(&str, Platform)] = &[
    ("windows", Platform::Windows),
    ("linux", Platform::Linux),
    ("macos", Platform::Darwin),
    ("darwin", Platform::Darwin),
];

impl Platform {
    /// Map a host OS identifier (as reported by `std::env::consts::OS`) to a
    /// descriptor platform.
    pub fn from_os(os: &str) -> Result<Self, RunnerError> {
        let normalized = os.trim().to_ascii_lowercase();
        PLATFORM_TABLE
            .iter()
            .find(|(name, _)| *name == normalized)
            .map(|(_, platform)| *platform)
            .ok_or_else(|| RunnerError::UnsupportedPlatform { os: os.to_string() })
    }

    /// Platform of the running host
    pub fn current() -> Result<Self, RunnerError> {
        Self::from_os(std::env::consts::OS)
    }

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Windows => "windows",
            Self::Linux => "linux",
            Self::Darwin => "darwin",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-platform command tokens; the first token is the program.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct PlatformCommands {
    #[serde(default)]
    pub windows: Vec<String>,
    #[serde(default)]
    pub linux: Vec<String>,
    #[serde(default)]
    pub darwin: Vec<String>,
}

impl PlatformCommands {
    #[must_use]
    pub fn for_platform(&self, platform: Platform) -> &[String] {
        match platform {
            Platform::Windows => &self.windows,
            Platform::Linux => &self.linux,
            Platform::Darwin => &self.darwin,
        }
    }
}
