//! Real child processes via `tokio::process`.
//!
//! With kill-tree enabled the child becomes the leader of a new process
//! group, and termination signals the whole group: SIGTERM first, SIGKILL
//! once the grace period runs out. A final SIGKILL sweep after the leader
//! exits catches descendants that ignored SIGTERM. The same sweep runs when
//! the leader exits on its own, so no workers outlive a supervised run.

use std::fs::OpenOptions;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::{Child, Command};
use tracing::{debug, warn};

use crate::descriptor::{ChildDescriptor, Output};
use crate::error::{SupervisorError, SupervisorResult};
use crate::launcher::{BoxFuture, ChildProcess, ExitInfo, ProcessLauncher};

/// Launches children as OS processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsLauncher;

impl ProcessLauncher for OsLauncher {
    fn launch(&self, desc: &ChildDescriptor) -> SupervisorResult<Box<dyn ChildProcess>> {
        let mut cmd = Command::new(&desc.program);
        cmd.args(&desc.args)
            .current_dir(&desc.cwd)
            .envs(desc.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .stdout(open_output(&desc.stdout)?)
            .stderr(open_output(&desc.stderr)?)
            // The supervisor decides when a child dies, not the runtime.
            .kill_on_drop(false);

        #[cfg(unix)]
        if desc.restart.kill_tree {
            cmd.process_group(0);
        }

        let child = cmd.spawn().map_err(|source| SupervisorError::Spawn {
            program: desc.program.display().to_string(),
            source,
        })?;
        let pid = child.id();
        debug!(role = %desc.role, ?pid, program = %desc.program.display(), "process spawned");

        Ok(Box::new(OsChild {
            child,
            pid,
            kill_tree: desc.restart.kill_tree,
        }))
    }
}

fn open_output(output: &Output) -> SupervisorResult<Stdio> {
    match output {
        Output::Inherit => Ok(Stdio::inherit()),
        Output::Null => Ok(Stdio::null()),
        Output::File(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|source| SupervisorError::Output {
                    path: path.display().to_string(),
                    source,
                })?;
            Ok(Stdio::from(file))
        }
    }
}

struct OsChild {
    child: Child,
    /// Captured at spawn; tokio forgets the pid once the child is reaped.
    pid: Option<u32>,
    /// Leader of its own process group.
    kill_tree: bool,
}

impl OsChild {
    async fn reap(&mut self) -> SupervisorResult<ExitInfo> {
        let status = self.child.wait().await.map_err(SupervisorError::Wait)?;
        Ok(ExitInfo::from(status))
    }
}

impl ChildProcess for OsChild {
    fn id(&self) -> Option<u32> {
        self.pid
    }

    fn wait(&mut self) -> BoxFuture<'_, SupervisorResult<ExitInfo>> {
        Box::pin(async move {
            let exit = self.reap().await;
            if self.kill_tree
                && let Some(pid) = self.pid
            {
                debug!(pid, "leader exited, sweeping its process group");
                sweep_group(pid);
            }
            exit
        })
    }

    fn terminate(
        &mut self,
        kill_tree: bool,
        grace: Duration,
    ) -> BoxFuture<'_, SupervisorResult<ExitInfo>> {
        Box::pin(async move {
            let Some(pid) = self.pid else {
                return self.reap().await;
            };

            // A child that already exited on its own just gets reaped.
            if let Ok(Some(status)) = self.child.try_wait() {
                if kill_tree {
                    sweep_group(pid);
                }
                return Ok(ExitInfo::from(status));
            }

            send_term(&mut self.child, pid, kill_tree);
            let waited = tokio::time::timeout(grace, self.reap()).await;
            let exit = match waited {
                Ok(exit) => exit?,
                Err(_) => {
                    warn!(pid, ?grace, "child ignored SIGTERM, killing");
                    send_kill(&mut self.child, pid, kill_tree);
                    self.reap().await?
                }
            };

            if kill_tree {
                sweep_group(pid);
            }
            Ok(exit)
        })
    }
}

// ── Signalling ─────────────────────────────────────────────────────

#[cfg(unix)]
fn signal(pid: u32, group: bool, sig: libc::c_int) -> std::io::Result<()> {
    let pid = pid as libc::pid_t;
    // SAFETY: plain syscalls on a pid we spawned; no memory is shared.
    let rc = unsafe {
        if group {
            libc::killpg(pid, sig)
        } else {
            libc::kill(pid, sig)
        }
    };
    if rc == 0 {
        Ok(())
    } else {
        Err(std::io::Error::last_os_error())
    }
}

#[cfg(unix)]
fn send_term(_child: &mut Child, pid: u32, kill_tree: bool) {
    if let Err(e) = signal(pid, kill_tree, libc::SIGTERM) {
        debug!(pid, error = %e, "SIGTERM not delivered");
    }
}

#[cfg(unix)]
fn send_kill(_child: &mut Child, pid: u32, kill_tree: bool) {
    if let Err(e) = signal(pid, kill_tree, libc::SIGKILL) {
        debug!(pid, error = %e, "SIGKILL not delivered");
    }
}

#[cfg(unix)]
fn sweep_group(pgid: u32) {
    // ESRCH here just means the group is already empty.
    let _ = signal(pgid, true, libc::SIGKILL);
}

#[cfg(not(unix))]
fn send_term(child: &mut Child, _pid: u32, _kill_tree: bool) {
    let _ = child.start_kill();
}

#[cfg(not(unix))]
fn send_kill(child: &mut Child, _pid: u32, _kill_tree: bool) {
    let _ = child.start_kill();
}

#[cfg(not(unix))]
fn sweep_group(_pgid: u32) {}
