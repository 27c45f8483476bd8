//! Domain types for the AiotA shared store.
//!
//! All types are serializable to/from JSON for storage in redb tables.
//! Timestamps are unix epoch milliseconds.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Fixed identity of the singleton platform configuration record.
pub const CONFIG_ID: u64 = 0;

/// Logical service name of the controller in [`PlatformConfig::ports`].
pub const CONTROLLER_SERVICE: &str = "controller";

// ── Platform configuration ─────────────────────────────────────────

/// The one configuration record shared by every process of a deployment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlatformConfig {
    pub id: u64,
    pub server: ServerIdentity,
    pub tls: TlsSettings,
    /// Logical service name → port assignment.
    pub ports: BTreeMap<String, PortAssignment>,
    pub database: DatabaseParams,
    pub broker: BrokerParams,
    pub paths: PathSettings,
    pub created_at: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerIdentity {
    pub name: String,
    /// Network address other hosts reach this server on.
    pub address: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TlsSettings {
    pub enabled: bool,
    pub key_path: String,
    pub cert_path: String,
}

/// A single port or an inclusive port range.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum PortAssignment {
    Single(u16),
    Range { start: u16, end: u16 },
}

impl PortAssignment {
    /// The lowest port in the assignment.
    pub fn first(&self) -> u16 {
        match *self {
            PortAssignment::Single(port) => port,
            PortAssignment::Range { start, .. } => start,
        }
    }

    pub fn contains(&self, port: u16) -> bool {
        match *self {
            PortAssignment::Single(p) => p == port,
            PortAssignment::Range { start, end } => (start..=end).contains(&port),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DatabaseParams {
    pub host: String,
    pub port: u16,
    pub name: String,
    pub user: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BrokerParams {
    pub protocol: String,
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub vhost: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PathSettings {
    pub install_root: String,
    pub log_dir: String,
}

impl PlatformConfig {
    pub fn port(&self, service: &str) -> Option<PortAssignment> {
        self.ports.get(service).copied()
    }

    /// Port the controller listens on, if one is assigned.
    pub fn controller_port(&self) -> Option<u16> {
        self.port(CONTROLLER_SERVICE).map(|p| p.first())
    }
}

// ── Process registry ──────────────────────────────────────────────

/// Liveness record of one supervised process.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProcessRecord {
    /// Host the process runs on.
    pub host: String,
    /// OS process identifier of the launched process.
    pub pid: u32,
    /// Role or script identifier ("controller", "ingestion", ...).
    pub role: String,
    pub started_at: u64,
    pub last_heartbeat: u64,
}

impl ProcessRecord {
    /// Build the composite key for the processes table.
    pub fn table_key(&self) -> String {
        process_key(&self.host, self.pid)
    }

    /// Whether the last heartbeat is older than `threshold_ms` at `now_ms`.
    pub fn is_stale(&self, threshold_ms: u64, now_ms: u64) -> bool {
        now_ms.saturating_sub(self.last_heartbeat) > threshold_ms
    }
}

/// Composite registry key for a host/pid pair.
pub fn process_key(host: &str, pid: u32) -> String {
    format!("{host}:{pid}")
}

// ── Log ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// One persisted platform log line.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LogEntry {
    /// Assigned by the store on append.
    pub seq: u64,
    pub at: u64,
    pub level: LogLevel,
    /// Identity of the process that logged ("aiota[1234]").
    pub source: String,
    /// Server the process runs on.
    pub server: String,
    pub message: String,
}
