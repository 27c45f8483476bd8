//! Lifecycle events emitted by a supervised handle.

use std::fmt;
use std::time::Duration;

/// One state transition of a supervised child.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupervisorEvent {
    /// Identifier of the handle that emitted the event.
    pub handle: u64,
    pub role: String,
    pub kind: EventKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    /// The child entered `Running`.
    Started { pid: Option<u32>, restarts: u32 },
    /// The child left `Running`.
    Exited {
        code: Option<i32>,
        signal: Option<i32>,
        uptime: Duration,
        /// Shorter than the policy's minimum uptime.
        spinning: bool,
        /// Ended by an explicit stop rather than on its own.
        requested: bool,
    },
    /// The launcher could not start the child.
    SpawnFailed { error: String },
    /// A restart is scheduled after `delay`.
    Restarting { delay: Duration, restarts: u32 },
    /// The restart budget is spent; the handle is now terminal.
    Exhausted { restarts: u32 },
}

impl EventKind {
    pub fn as_label(&self) -> &'static str {
        match self {
            EventKind::Started { .. } => "started",
            EventKind::Exited { .. } => "exited",
            EventKind::SpawnFailed { .. } => "spawn_failed",
            EventKind::Restarting { .. } => "restarting",
            EventKind::Exhausted { .. } => "exhausted",
        }
    }

    /// Whether the event reports a failure an operator should see.
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            EventKind::SpawnFailed { .. } | EventKind::Exhausted { .. }
        )
    }
}

impl fmt::Display for SupervisorEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let role = &self.role;
        let id = self.handle;
        match &self.kind {
            EventKind::Started { pid, restarts } => match pid {
                Some(pid) => write!(f, "{role} #{id} started with pid {pid} (restarts: {restarts})"),
                None => write!(f, "{role} #{id} started (restarts: {restarts})"),
            },
            EventKind::Exited {
                code,
                signal,
                uptime,
                spinning,
                requested,
            } => {
                write!(f, "{role} #{id} exited")?;
                match (code, signal) {
                    (Some(code), _) => write!(f, " with code {code}")?,
                    (None, Some(signal)) => write!(f, " on signal {signal}")?,
                    (None, None) => {}
                }
                write!(f, " after {}ms", uptime.as_millis())?;
                if *requested {
                    f.write_str(" (stop requested)")?;
                } else if *spinning {
                    f.write_str(" (spinning)")?;
                }
                Ok(())
            }
            EventKind::SpawnFailed { error } => write!(f, "{role} #{id} failed to start: {error}"),
            EventKind::Restarting { delay, restarts } => write!(
                f,
                "{role} #{id} restarting in {}ms (restart {restarts})",
                delay.as_millis()
            ),
            EventKind::Exhausted { restarts } => write!(
                f,
                "{role} #{id} exhausted its restarts ({restarts} used), giving up"
            ),
        }
    }
}
