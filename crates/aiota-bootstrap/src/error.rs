use aiota_core::CoreError;
use aiota_state::StateError;
use aiota_supervisor::SupervisorError;

use crate::probe::ProbeError;

pub type BootstrapResult<T> = Result<T, BootstrapError>;

#[derive(Debug, thiserror::Error)]
pub enum BootstrapError {
    #[error("invalid launcher settings: {0}")]
    Settings(#[from] CoreError),

    #[error("cannot connect to the shared store at {uri}: {source}")]
    Connection {
        uri: String,
        #[source]
        source: StateError,
    },

    #[error("cannot read or create the platform configuration: {0}")]
    Config(#[source] StateError),

    #[error("the platform configuration assigns no port to service '{service}'")]
    NoControllerPort { service: String },

    #[error("cannot create log directory {path}: {source}")]
    Directory {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("controller port check failed: {0}")]
    PortProbe(#[from] ProbeError),

    #[error("an AiotA controller is already running ({host}:{port} is in use)")]
    PortConflict { host: String, port: u16 },

    #[error("cannot clear stale process records: {0}")]
    Registry(#[source] StateError),

    #[error("{role} exhausted its {restarts} restarts")]
    ControllerExhausted { role: String, restarts: u32 },

    #[error(transparent)]
    Supervisor(#[from] SupervisorError),
}

impl BootstrapError {
    /// Stable label for structured logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            BootstrapError::Settings(_) => "settings",
            BootstrapError::Connection { .. } => "connection",
            BootstrapError::Config(_) => "config",
            BootstrapError::NoControllerPort { .. } => "no_controller_port",
            BootstrapError::Directory { .. } => "directory",
            BootstrapError::PortProbe(_) => "port_probe",
            BootstrapError::PortConflict { .. } => "port_conflict",
            BootstrapError::Registry(_) => "registry",
            BootstrapError::ControllerExhausted { .. } => "controller_exhausted",
            BootstrapError::Supervisor(_) => "supervisor",
        }
    }

    /// Process exit status for this failure.
    pub fn exit_code(&self) -> u8 {
        match self {
            BootstrapError::ControllerExhausted { .. } => 2,
            _ => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes() {
        let conflict = BootstrapError::PortConflict {
            host: "127.0.0.1".to_string(),
            port: 8000,
        };
        assert_eq!(conflict.exit_code(), 1);
        assert_eq!(conflict.as_label(), "port_conflict");

        let exhausted = BootstrapError::ControllerExhausted {
            role: "controller".to_string(),
            restarts: 3,
        };
        assert_eq!(exhausted.exit_code(), 2);
        assert_eq!(exhausted.to_string(), "controller exhausted its 3 restarts");
    }
}
