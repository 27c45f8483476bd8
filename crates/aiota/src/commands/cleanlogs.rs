use std::path::Path;
use std::process::ExitCode;

use anyhow::Context;

pub const DEFAULT_LOG_DIR: &str = "/var/log/aiota";

pub fn run(log_dir: &Path) -> anyhow::Result<ExitCode> {
    let removed = aiota_bootstrap::clean_logs(log_dir)
        .with_context(|| format!("cleaning {}", log_dir.display()))?;
    println!("removed {removed} log files from {}", log_dir.display());
    Ok(ExitCode::SUCCESS)
}
