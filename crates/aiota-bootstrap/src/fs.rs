//! Log directory handling.

use std::io;
use std::path::Path;

use tracing::debug;

/// File extensions written to the platform log directory.
pub const LOG_EXTENSIONS: [&str; 3] = ["log", "out", "err"];

pub trait DirectoryEnsurer: Send + Sync {
    /// Create `path` (and parents) unless it already exists.
    fn ensure_dir(&self, path: &Path) -> io::Result<()>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct StdFs;

impl DirectoryEnsurer for StdFs {
    fn ensure_dir(&self, path: &Path) -> io::Result<()> {
        std::fs::create_dir_all(path)
    }
}

/// Delete historical log files from `dir`, returning how many were removed.
///
/// Only regular files with a platform log extension are touched. A missing
/// directory has nothing to clean.
pub fn clean_logs(dir: &Path) -> io::Result<usize> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e),
    };

    let mut removed = 0;
    for entry in entries {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let path = entry.path();
        let is_log = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| LOG_EXTENSIONS.contains(&ext));
        if is_log {
            std::fs::remove_file(&path)?;
            debug!(path = %path.display(), "log file removed");
            removed += 1;
        }
    }
    Ok(removed)
}
