use std::collections::BTreeSet;
use std::path::Path;
use std::process::ExitCode;
use std::time::Duration;

use aiota_bootstrap::ProcessRegistry;
use aiota_core::config::LauncherConfig;
use aiota_core::{StoreUri, epoch_millis};
use aiota_state::StateStore;
use anyhow::Context;

/// Heartbeats older than this are reported as stale.
const STALE_AFTER: Duration = Duration::from_secs(30);

const RECENT_LOG_LINES: usize = 10;

pub fn run(config_path: &Path, store: Option<&str>) -> anyhow::Result<ExitCode> {
    let uri = match store {
        Some(uri) => StoreUri::parse(uri)?,
        None => LauncherConfig::load(config_path)
            .with_context(|| format!("loading {}", config_path.display()))?
            .store_uri()?,
    };
    let store = StateStore::connect(&uri).with_context(|| format!("opening store {uri}"))?;

    match store.get_config()? {
        Some(config) => println!(
            "server {} ({}), controller port {}",
            config.server.name,
            config.server.address,
            config
                .controller_port()
                .map_or_else(|| "unassigned".to_string(), |p| p.to_string())
        ),
        None => println!("no platform configuration yet"),
    }

    let now = epoch_millis();
    let registry = ProcessRegistry::new(&store);
    let records = registry.list()?;
    let stale: BTreeSet<String> = registry
        .stale(STALE_AFTER, now)?
        .iter()
        .map(|r| r.table_key())
        .collect();
    if records.is_empty() {
        println!("no registered processes");
    } else {
        println!("{:<24} {:>8}  {:<16} {:>10}", "HOST", "PID", "ROLE", "HEARTBEAT");
        for record in &records {
            let age = now.saturating_sub(record.last_heartbeat) / 1000;
            let marker = if stale.contains(&record.table_key()) { " stale" } else { "" };
            println!(
                "{:<24} {:>8}  {:<16} {:>9}s{marker}",
                record.host, record.pid, record.role, age
            );
        }
    }

    let logs = store.recent_logs(RECENT_LOG_LINES)?;
    if !logs.is_empty() {
        println!();
        for entry in logs {
            println!(
                "{} {:<5} {} {}: {}",
                entry.at,
                entry.level.as_str(),
                entry.server,
                entry.source,
                entry.message
            );
        }
    }

    Ok(ExitCode::SUCCESS)
}
