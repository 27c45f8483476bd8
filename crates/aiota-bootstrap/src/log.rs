//! Platform event log.
//!
//! Every bootstrap message carries the identity of the process that wrote it
//! and the server it runs on. Messages always go to `tracing`; when a store
//! handle is available they are also appended to the store's log table.
//! Logging never fails the caller.

use std::fmt;

use aiota_core::epoch_millis;
use aiota_state::{LogEntry, LogLevel, StateStore};
use tracing::{debug, error, info, warn};

/// Name and pid of the process emitting log entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceIdentity {
    pub name: String,
    pub pid: u32,
}

impl SourceIdentity {
    pub fn new(name: impl Into<String>, pid: u32) -> Self {
        Self {
            name: name.into(),
            pid,
        }
    }

    /// Identity of the running process.
    pub fn current(name: impl Into<String>) -> Self {
        Self::new(name, std::process::id())
    }
}

impl fmt::Display for SourceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.name, self.pid)
    }
}

pub trait EventLog: Send + Sync {
    fn log(
        &self,
        source: &SourceIdentity,
        server: &str,
        store: Option<&StateStore>,
        level: LogLevel,
        message: &str,
    );
}

/// Logs through `tracing`, mirroring entries into the store when given one.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLog;

impl EventLog for TracingLog {
    fn log(
        &self,
        source: &SourceIdentity,
        server: &str,
        store: Option<&StateStore>,
        level: LogLevel,
        message: &str,
    ) {
        match level {
            LogLevel::Debug => debug!(%source, %server, "{message}"),
            LogLevel::Info => info!(%source, %server, "{message}"),
            LogLevel::Warn => warn!(%source, %server, "{message}"),
            LogLevel::Error => error!(%source, %server, "{message}"),
        }

        let Some(store) = store else {
            return;
        };
        let entry = LogEntry {
            seq: 0,
            at: epoch_millis(),
            level,
            source: source.to_string(),
            server: server.to_string(),
            message: message.to_string(),
        };
        if let Err(e) = store.append_log(&entry) {
            warn!(error = %e, "failed to persist log entry");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_identity_display() {
        assert_eq!(SourceIdentity::new("aiota", 1234).to_string(), "aiota[1234]");
        assert_eq!(SourceIdentity::current("aiota").pid, std::process::id());
    }

    #[test]
    fn entries_are_persisted_when_a_store_is_given() {
        let store = StateStore::open_in_memory().unwrap();
        let source = SourceIdentity::new("aiota", 7);

        TracingLog.log(&source, "node-1", Some(&store), LogLevel::Warn, "port check inconclusive");
        TracingLog.log(&source, "node-1", None, LogLevel::Info, "not persisted");

        let entries = store.recent_logs(10).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].source, "aiota[7]");
        assert_eq!(entries[0].server, "node-1");
        assert_eq!(entries[0].level, LogLevel::Warn);
        assert_eq!(entries[0].message, "port check inconclusive");
    }
}
