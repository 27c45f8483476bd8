//! Supervisor — runs one child per handle under a bounded restart policy.
//!
//! `spawn` starts a background task per handle. The task launches the child,
//! waits for it to exit (or for a stop request), consults the
//! [`RestartTracker`] and either relaunches after the policy's delay or
//! settles in a terminal [`ChildState::Stopped`]. The current state is
//! published through a `watch` channel so handles can snapshot or await it.
//!
//! Dropping a [`Handle`] detaches it: supervision carries on until the restart
//! budget is spent.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::descriptor::ChildDescriptor;
use crate::error::{SupervisorError, SupervisorResult};
use crate::events::{EventKind, SupervisorEvent};
use crate::launcher::{ExitInfo, ProcessLauncher};
use crate::policy::{Decision, RestartTracker};
use crate::process::OsLauncher;

/// Observer invoked synchronously for every lifecycle event.
pub type EventCallback = Arc<dyn Fn(&SupervisorEvent) + Send + Sync>;

/// Why a handle stopped for good.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The restart budget ran out.
    Exhausted,
    /// [`Handle::stop`] was called.
    Requested,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildState {
    Starting,
    Running { pid: Option<u32> },
    Exited,
    Stopped(StopReason),
}

impl ChildState {
    pub fn stop_reason(&self) -> Option<StopReason> {
        match self {
            ChildState::Stopped(reason) => Some(*reason),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.stop_reason().is_some()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ChildState::Starting => "starting",
            ChildState::Running { .. } => "running",
            ChildState::Exited => "exited",
            ChildState::Stopped(StopReason::Exhausted) => "stopped (exhausted)",
            ChildState::Stopped(StopReason::Requested) => "stopped (requested)",
        }
    }
}

/// Snapshot published by the supervision task.
#[derive(Debug, Clone, Copy)]
struct Status {
    state: ChildState,
    restarts: u32,
}

/// Spawns supervised children.
#[derive(Clone)]
pub struct Supervisor {
    launcher: Arc<dyn ProcessLauncher>,
    observer: Option<EventCallback>,
    next_id: Arc<AtomicU64>,
}

impl Supervisor {
    pub fn new(launcher: Arc<dyn ProcessLauncher>) -> Self {
        Self {
            launcher,
            observer: None,
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Supervisor that starts real OS processes.
    pub fn os() -> Self {
        Self::new(Arc::new(OsLauncher))
    }

    /// Set the observer that receives every lifecycle event.
    pub fn with_observer(mut self, observer: EventCallback) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Start supervising `desc`. Must be called from within a tokio runtime.
    pub fn spawn(&self, desc: ChildDescriptor) -> Handle {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let role = desc.role.clone();
        let (status_tx, status_rx) = watch::channel(Status {
            state: ChildState::Starting,
            restarts: 0,
        });
        let (stop_tx, stop_rx) = watch::channel(false);

        let task = SupervisionTask {
            id,
            desc,
            launcher: self.launcher.clone(),
            observer: self.observer.clone(),
            status: status_tx,
            stop: stop_rx,
        };
        tokio::spawn(task.run());

        info!(%role, handle = id, "supervision started");
        Handle {
            id,
            role,
            status: status_rx,
            stop: stop_tx,
        }
    }
}

/// Caller's view of one supervised child.
pub struct Handle {
    id: u64,
    role: String,
    status: watch::Receiver<Status>,
    stop: watch::Sender<bool>,
}

impl std::fmt::Debug for Handle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Handle")
            .field("id", &self.id)
            .field("role", &self.role)
            .field("state", &self.state())
            .finish()
    }
}

impl Handle {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn role(&self) -> &str {
        &self.role
    }

    pub fn state(&self) -> ChildState {
        self.status.borrow().state
    }

    /// Restarts consumed so far. Never decreases.
    pub fn restarts(&self) -> u32 {
        self.status.borrow().restarts
    }

    /// Pid of the running child, if it is running.
    pub fn pid(&self) -> Option<u32> {
        match self.state() {
            ChildState::Running { pid } => pid,
            _ => None,
        }
    }

    /// Ask the supervisor to stop the child (tree) without restarting it.
    pub fn stop(&self) {
        self.stop.send_replace(true);
    }

    /// Wait until the handle reaches a terminal state.
    pub async fn wait(&self) -> SupervisorResult<StopReason> {
        let mut status = self.status.clone();
        let reached = status
            .wait_for(|s| s.state.is_terminal())
            .await
            .map(|s| s.state.stop_reason())
            .ok()
            .flatten();
        reached.ok_or_else(|| SupervisorError::TaskLost {
            role: self.role.clone(),
        })
    }

    /// Stop the child and wait for it to be gone.
    pub async fn shutdown(&self) -> SupervisorResult<StopReason> {
        self.stop();
        self.wait().await
    }
}

// ── Supervision loop ───────────────────────────────────────────────

enum Wake {
    Exited(SupervisorResult<ExitInfo>),
    Stop,
}

struct SupervisionTask {
    id: u64,
    desc: ChildDescriptor,
    launcher: Arc<dyn ProcessLauncher>,
    observer: Option<EventCallback>,
    status: watch::Sender<Status>,
    stop: watch::Receiver<bool>,
}

impl SupervisionTask {
    async fn run(mut self) {
        let mut tracker = RestartTracker::new(self.desc.restart.clone());
        let policy = self.desc.restart.clone();

        let reason = loop {
            if *self.stop.borrow() {
                break StopReason::Requested;
            }
            self.set_state(ChildState::Starting);

            let started = Instant::now();
            let uptime = match self.launcher.launch(&self.desc) {
                Err(e) => {
                    self.emit(EventKind::SpawnFailed {
                        error: e.to_string(),
                    });
                    Duration::ZERO
                }
                Ok(mut child) => {
                    let pid = child.id();
                    self.set_state(ChildState::Running { pid });
                    self.emit(EventKind::Started {
                        pid,
                        restarts: tracker.restarts(),
                    });

                    let wake = tokio::select! {
                        res = child.wait() => Wake::Exited(res),
                        _ = stop_requested(&mut self.stop) => Wake::Stop,
                    };
                    let (exit, requested) = match wake {
                        Wake::Exited(res) => (res, false),
                        Wake::Stop => (child.terminate(policy.kill_tree, policy.kill_grace).await, true),
                    };

                    let uptime = started.elapsed();
                    let exit = exit.unwrap_or_else(|e| {
                        warn!(role = %self.desc.role, error = %e, "lost track of child exit");
                        ExitInfo::default()
                    });
                    self.emit(EventKind::Exited {
                        code: exit.code,
                        signal: exit.signal,
                        uptime,
                        spinning: tracker.is_spinning(uptime),
                        requested,
                    });
                    self.set_state(ChildState::Exited);

                    if requested {
                        break StopReason::Requested;
                    }
                    uptime
                }
            };

            match tracker.on_exit(uptime) {
                Decision::Restart { delay } => {
                    let restarts = tracker.restarts();
                    self.status.send_modify(|s| s.restarts = restarts);
                    self.emit(EventKind::Restarting { delay, restarts });

                    let stopped = tokio::select! {
                        _ = tokio::time::sleep(delay) => false,
                        _ = stop_requested(&mut self.stop) => true,
                    };
                    if stopped {
                        break StopReason::Requested;
                    }
                }
                Decision::Exhausted => {
                    self.emit(EventKind::Exhausted {
                        restarts: tracker.restarts(),
                    });
                    break StopReason::Exhausted;
                }
            }
        };

        self.set_state(ChildState::Stopped(reason));
        info!(role = %self.desc.role, handle = self.id, ?reason, "supervision ended");
    }

    fn set_state(&self, state: ChildState) {
        self.status.send_modify(|s| s.state = state);
    }

    fn emit(&self, kind: EventKind) {
        let event = SupervisorEvent {
            handle: self.id,
            role: self.desc.role.clone(),
            kind,
        };
        if event.kind.is_failure() {
            error!(role = %event.role, handle = event.handle, kind = event.kind.as_label(), "{event}");
        } else {
            info!(role = %event.role, handle = event.handle, kind = event.kind.as_label(), "{event}");
        }
        if let Some(observer) = &self.observer {
            observer(&event);
        }
    }
}

/// Resolve once a stop is requested. Pends forever if the handle was dropped.
async fn stop_requested(stop: &mut watch::Receiver<bool>) {
    if stop.wait_for(|stop| *stop).await.is_err() {
        std::future::pending::<()>().await;
    }
}
