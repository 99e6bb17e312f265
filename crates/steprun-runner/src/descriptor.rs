//! Runner descriptors and where to find them
//!
//! A descriptor is the `<language>.json` manifest an installed runner ships
//! with. It names the runner, declares per-platform run and init commands and
//! the range of framework versions the runner supports. The directory holding
//! the descriptor becomes the runner's working directory.

use serde::{Deserialize, Serialize};
use std::io;
use std::path::{Path, PathBuf};
use steprun_utils::version::{Version, VersionSupport, check_compatibility};

use crate::command_spec::CommandSpec;
use crate::error::RunnerError;
use crate::platform::{Platform, PlatformCommands};

/// Parsed runner descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunnerDescriptor {
    pub id: String,
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub description: String,
    pub run: PlatformCommands,
    #[serde(default)]
    pub init: PlatformCommands,
    #[serde(default)]
    pub lib: String,
    pub gauge_version_support: VersionSupport,
    /// Directory the descriptor was loaded from
    #[serde(skip)]
    pub dir: PathBuf,
}

impl RunnerDescriptor {
    /// Parse a descriptor file and record its directory.
    pub fn from_file(path: &Path) -> Result<Self, RunnerError> {
        let content = std::fs::read_to_string(path).map_err(|e| RunnerError::Parse {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let mut descriptor: Self =
            serde_json::from_str(&content).map_err(|e| RunnerError::Parse {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;

        descriptor.dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        Ok(descriptor)
    }

    /// Command that starts the runner on `platform`, rooted in the descriptor
    /// directory.
    pub fn run_command(&self, platform: Platform) -> Result<CommandSpec, RunnerError> {
        self.command(&self.run, "run", platform)
    }

    /// One-time initialisation command for `platform`.
    pub fn init_command(&self, platform: Platform) -> Result<CommandSpec, RunnerError> {
        self.command(&self.init, "init", platform)
    }

    fn command(
        &self,
        commands: &PlatformCommands,
        phase: &'static str,
        platform: Platform,
    ) -> Result<CommandSpec, RunnerError> {
        CommandSpec::from_tokens(commands.for_platform(platform))
            .map(|cmd| cmd.cwd(&self.dir))
            .ok_or_else(|| RunnerError::MissingCommand {
                runner: self.id.clone(),
                phase,
                platform,
            })
    }

    /// Fail unless `current` lies within the declared support range.
    pub fn ensure_compatible(&self, current: &Version) -> Result<(), RunnerError> {
        check_compatibility(current, &self.gauge_version_support).map_err(|source| {
            RunnerError::IncompatibleVersion {
                runner: self.id.clone(),
                current: *current,
                source,
            }
        })
    }
}

/// Resolves a language name to the path of its descriptor file.
pub trait DescriptorLocator: Send + Sync {
    fn descriptor_path(&self, language: &str) -> Result<PathBuf, RunnerError>;
}

/// Locates descriptors in a Gauge-style plugin installation.
///
/// Layout: `<plugins_dir>/<language>/<version>/<language>.json`, where the
/// highest installed version wins. A flat `<plugins_dir>/<language>/<language>.json`
/// is accepted when no versioned install exists.
#[derive(Debug, Clone)]
pub struct PluginDirLocator {
    plugins_dir: PathBuf,
}

impl PluginDirLocator {
    #[must_use]
    pub fn new(plugins_dir: impl Into<PathBuf>) -> Self {
        Self {
            plugins_dir: plugins_dir.into(),
        }
    }

    #[must_use]
    pub fn plugins_dir(&self) -> &Path {
        &self.plugins_dir
    }

    fn latest_versioned(&self, plugin_dir: &Path, file_name: &str) -> io::Result<Option<PathBuf>> {
        let mut best: Option<(Version, PathBuf)> = None;

        for entry in std::fs::read_dir(plugin_dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let Some(version) = entry
                .file_name()
                .to_str()
                .and_then(|name| name.parse::<Version>().ok())
            else {
                continue;
            };
            let candidate = entry.path().join(file_name);
            if !candidate.is_file() {
                continue;
            }
            if best.as_ref().is_none_or(|(current, _)| version > *current) {
                best = Some((version, candidate));
            }
        }

        Ok(best.map(|(_, path)| path))
    }
}

impl DescriptorLocator for PluginDirLocator {
    fn descriptor_path(&self, language: &str) -> Result<PathBuf, RunnerError> {
        let not_found = |reason: String| RunnerError::NotFound {
            language: language.to_string(),
            reason,
        };

        if language.is_empty()
            || language.contains(['/', '\\'])
            || language == "."
            || language == ".."
        {
            return Err(not_found("invalid language name".to_string()));
        }

        let plugin_dir = self.plugins_dir.join(language);
        if !plugin_dir.is_dir() {
            return Err(not_found(format!("{} does not exist", plugin_dir.display())));
        }

        let file_name = format!("{language}.json");
        let versioned = self
            .latest_versioned(&plugin_dir, &file_name)
            .map_err(|e| not_found(format!("cannot read {}: {e}", plugin_dir.display())))?;
        if let Some(path) = versioned {
            return Ok(path);
        }

        let flat = plugin_dir.join(&file_name);
        if flat.is_file() {
            return Ok(flat);
        }

        Err(not_found(format!(
            "no {file_name} under {}",
            plugin_dir.display()
        )))
    }
}

/// Resolve and parse the descriptor for `language`.
pub fn load_descriptor(
    locator: &dyn DescriptorLocator,
    language: &str,
) -> Result<RunnerDescriptor, RunnerError> {
    let path = locator.descriptor_path(language)?;
    RunnerDescriptor::from_file(&path)
}
