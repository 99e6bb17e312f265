//! The runner's one-time init command

use std::process::Stdio;
use steprun_utils::Logger;

use crate::descriptor::{DescriptorLocator, load_descriptor};
use crate::error::RunnerError;
use crate::platform::Platform;

/// Run the runner's one-time init command for the current platform.
///
/// The command runs in the descriptor's directory with the parent's stdio and
/// environment. A spawn failure is returned straight away; otherwise the
/// command is waited on and a non-zero exit becomes
/// [`RunnerError::InitHookFailed`].
pub async fn run_init_hook(
    locator: &dyn DescriptorLocator,
    language: &str,
    logger: &dyn Logger,
) -> Result<(), RunnerError> {
    let descriptor = load_descriptor(locator, language)?;
    let spec = descriptor.init_command(Platform::current()?)?;
    logger.debug(&format!(
        "Running init hook for '{}': {}",
        descriptor.id,
        spec.display()
    ));

    let status = spec
        .to_tokio_command()
        .stdin(Stdio::null())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .status()
        .await
        .map_err(|e| RunnerError::Launch {
            command: spec.display(),
            reason: e.to_string(),
        })?;

    if status.success() {
        Ok(())
    } else {
        Err(RunnerError::InitHookFailed {
            status: status.to_string(),
            exit_code: status.code(),
        })
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::descriptor::PluginDirLocator;
    use std::fs;
    use steprun_utils::TracingLogger;
    use tempfile::TempDir;

    fn install(plugins: &std::path::Path, init: &[&str]) -> std::path::PathBuf {
        let dir = plugins.join("ruby");
        fs::create_dir_all(&dir).unwrap();
        fs::write(
            dir.join("ruby.json"),
            serde_json::json!({
                "id": "ruby",
                "name": "Ruby",
                "version": "1.0.0",
                "run": { "linux": ["ruby", "run.rb"], "darwin": ["ruby", "run.rb"] },
                "init": { "linux": init, "darwin": init },
                "gaugeVersionSupport": { "minimum": "0.0.1" }
            })
            .to_string(),
        )
        .unwrap();
        dir
    }

    #[tokio::test]
    async fn test_init_runs_in_descriptor_dir() {
        let temp = TempDir::new().unwrap();
        let dir = install(temp.path(), &["sh", "-c", "touch initialized"]);

        run_init_hook(&PluginDirLocator::new(temp.path()), "ruby", &TracingLogger)
            .await
            .unwrap();
        assert!(dir.join("initialized").exists());
    }

    #[tokio::test]
    async fn test_failing_init_reports_exit_code() {
        let temp = TempDir::new().unwrap();
        install(temp.path(), &["sh", "-c", "exit 7"]);

        let err = run_init_hook(&PluginDirLocator::new(temp.path()), "ruby", &TracingLogger)
            .await
            .unwrap_err();
        assert!(matches!(err, RunnerError::InitHookFailed { exit_code: Some(7), .. }));
    }

    #[tokio::test]
    async fn test_missing_init_command() {
        let temp = TempDir::new().unwrap();
        install(temp.path(), &[]);

        let err = run_init_hook(&PluginDirLocator::new(temp.path()), "ruby", &TracingLogger)
            .await
            .unwrap_err();
        assert!(matches!(err, RunnerError::MissingCommand { phase: "init", .. }));
    }

    #[tokio::test]
    async fn test_unspawnable_init_command() {
        let temp = TempDir::new().unwrap();
        install(temp.path(), &["steprun-definitely-not-a-program"]);

        let err = run_init_hook(&PluginDirLocator::new(temp.path()), "ruby", &TracingLogger)
            .await
            .unwrap_err();
        assert!(matches!(err, RunnerError::Launch { .. }));
    }
}
