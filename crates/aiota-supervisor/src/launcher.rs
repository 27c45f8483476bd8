//! Process-launching seam between the supervisor loop and the OS.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use crate::descriptor::ChildDescriptor;
use crate::error::SupervisorResult;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// How a child ended.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExitInfo {
    pub code: Option<i32>,
    /// Terminating signal, when the child was killed by one.
    pub signal: Option<i32>,
}

impl ExitInfo {
    pub fn code(code: i32) -> Self {
        Self {
            code: Some(code),
            signal: None,
        }
    }

    pub fn signal(signal: i32) -> Self {
        Self {
            code: None,
            signal: Some(signal),
        }
    }
}

impl From<std::process::ExitStatus> for ExitInfo {
    fn from(status: std::process::ExitStatus) -> Self {
        #[cfg(unix)]
        let signal = std::os::unix::process::ExitStatusExt::signal(&status);
        #[cfg(not(unix))]
        let signal = None;
        Self {
            code: status.code(),
            signal,
        }
    }
}

/// Starts child processes.
pub trait ProcessLauncher: Send + Sync {
    fn launch(&self, desc: &ChildDescriptor) -> SupervisorResult<Box<dyn ChildProcess>>;
}

/// A running child, as seen by the supervisor loop.
pub trait ChildProcess: Send {
    /// OS process id, if the launcher has one.
    fn id(&self) -> Option<u32>;

    /// Resolve when the child exits. Must be cancel-safe.
    fn wait(&mut self) -> BoxFuture<'_, SupervisorResult<ExitInfo>>;

    /// Stop the child (and its process group when `kill_tree`), escalating
    /// to a hard kill after `grace`.
    fn terminate(
        &mut self,
        kill_tree: bool,
        grace: Duration,
    ) -> BoxFuture<'_, SupervisorResult<ExitInfo>>;
}
