//! Command implementations

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use steprun_config::{ConfigError, RunnerSettings};
use steprun_runner::{
    LaunchOptions, PluginDirLocator, RunnerError, StartChannels, load_descriptor, run_init_hook,
};
use steprun_utils::notice::DeferredNotice;
use steprun_utils::{FRAMEWORK_VERSION, Logger, TracingLogger};

use super::args::Commands;

pub(super) async fn dispatch(command: Commands, settings: &RunnerSettings) -> Result<()> {
    match command {
        Commands::Check { language } => check(&language, settings),
        Commands::Init { language } => init(&language, settings).await,
        Commands::Start { language, hold_ms } => {
            start(&language, Duration::from_millis(hold_ms), settings).await
        }
    }
}

fn locator(settings: &RunnerSettings) -> Result<PluginDirLocator, ConfigError> {
    settings
        .plugins_dir
        .clone()
        .map(PluginDirLocator::new)
        .ok_or_else(|| ConfigError::InvalidValue {
            key: "plugins_dir".to_string(),
            value: "not set and no home directory to default from".to_string(),
        })
}

fn check(language: &str, settings: &RunnerSettings) -> Result<()> {
    let descriptor = load_descriptor(&locator(settings)?, language)?;
    let support = &descriptor.gauge_version_support;

    println!(
        "{} {} ({})",
        descriptor.name,
        descriptor.version,
        descriptor.dir.display()
    );
    if support.maximum.trim().is_empty() {
        println!("  supports framework {} and later", support.minimum);
    } else {
        println!(
            "  supports framework {} to {}",
            support.minimum, support.maximum
        );
    }

    descriptor.ensure_compatible(&FRAMEWORK_VERSION)?;
    println!("✓ Compatible with framework {FRAMEWORK_VERSION}");
    Ok(())
}

async fn init(language: &str, settings: &RunnerSettings) -> Result<()> {
    run_init_hook(&locator(settings)?, language, &TracingLogger).await?;
    println!("✓ Initialized {language} runner");
    Ok(())
}

async fn start(language: &str, hold: Duration, settings: &RunnerSettings) -> Result<()> {
    let logger: Arc<dyn Logger> = Arc::new(TracingLogger);
    let options = LaunchOptions::new(settings.connection_timeout)
        .with_port(settings.port)
        .with_logger(logger.clone());

    let channels = StartChannels::spawn(
        Arc::new(locator(settings)?),
        language,
        FRAMEWORK_VERSION,
        options,
    );
    let kill = channels.kill.clone();
    let started = channels.wait();
    tokio::pin!(started);

    let mut runner = tokio::select! {
        result = &mut started => result?,
        _ = tokio::signal::ctrl_c() => {
            kill.cancel();
            if let Ok(mut runner) = started.await {
                runner
                    .stop(settings.kill_timeout, settings.kill_poll_interval)
                    .await?;
            }
            return Err(RunnerError::StartCancelled.into());
        }
    };
    println!("✓ {language} runner connected (PID {})", runner.pid());

    // Crashes while the runner is held are reported once the hold ends
    let notice = runner.take_exit_errors().map(|errors| {
        DeferredNotice::spawn(
            async move {
                errors
                    .await
                    .ok()
                    .map(|err| format!("Runner exited while live: {err}"))
            },
            logger.clone(),
        )
    });

    tokio::select! {
        () = tokio::time::sleep(hold) => {}
        _ = tokio::signal::ctrl_c() => logger.info("Interrupted, stopping runner"),
    }
    if let Some(notice) = notice {
        notice.flush().await;
    }

    runner
        .stop(settings.kill_timeout, settings.kill_poll_interval)
        .await?;
    println!("✓ {language} runner stopped");
    Ok(())
}
