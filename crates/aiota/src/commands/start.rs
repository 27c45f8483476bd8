use std::path::Path;
use std::process::ExitCode;

use aiota_bootstrap::{BootstrapCoordinator, BootstrapSettings};
use aiota_core::ProbePolicy;
use aiota_core::config::LauncherConfig;
use anyhow::Context;
use tracing::{info, warn};

pub async fn run(
    config_path: &Path,
    store: Option<&str>,
    probe_policy: Option<ProbePolicy>,
) -> anyhow::Result<ExitCode> {
    let mut config = LauncherConfig::load(config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;
    if let Some(uri) = store {
        config.store.uri = uri.to_string();
    }
    if let Some(policy) = probe_policy {
        config.probe.policy = policy;
    }

    let settings = BootstrapSettings::from_config(&config)?;
    info!(store = %settings.store_uri, probe_policy = settings.probe_policy.as_str(), "AiotA starting");

    let coordinator = BootstrapCoordinator::new(settings);
    match coordinator.run(shutdown_signal()).await {
        Ok(reason) => {
            info!(?reason, "AiotA stopped");
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            eprintln!("aiota> {e}");
            Ok(ExitCode::from(e.exit_code()))
        }
    }
}

/// Resolve on SIGINT or SIGTERM (Ctrl-C elsewhere).
///
/// If the handlers cannot be installed the launcher keeps running without them.
async fn shutdown_signal() {
    if let Err(e) = wait_for_signal().await {
        warn!(error = %e, "cannot listen for shutdown signals");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}

#[cfg(unix)]
async fn wait_for_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    tokio::select! {
        _ = sigint.recv() => {},
        _ = sigterm.recv() => {},
    }
    Ok(())
}

#[cfg(not(unix))]
async fn wait_for_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}
