//! aiota-supervisor — spawns one child process and keeps it running under a
//! bounded restart policy.
//!
//! A [`Supervisor`] turns a [`ChildDescriptor`] into a [`Handle`]. Each handle
//! owns a tokio task that walks the child through
//! `Starting → Running → Exited` and either restarts it after the configured
//! delay or parks it in a terminal `Stopped` state. Every transition is
//! reported as a [`SupervisorEvent`] to an optional observer and to `tracing`.
//!
//! Process creation sits behind the [`ProcessLauncher`] trait. [`OsLauncher`]
//! starts real processes through `tokio::process`, placing each child in its
//! own process group when kill-tree is enabled so that stopping it also
//! terminates everything it spawned.

pub mod descriptor;
pub mod error;
pub mod events;
pub mod launcher;
pub mod policy;
pub mod process;
pub mod supervisor;

pub use descriptor::{ChildDescriptor, Output, RestartPolicy};
pub use error::{SupervisorError, SupervisorResult};
pub use events::{EventKind, SupervisorEvent};
pub use launcher::{BoxFuture, ChildProcess, ExitInfo, ProcessLauncher};
pub use policy::{Decision, RestartTracker};
pub use process::OsLauncher;
pub use supervisor::{ChildState, EventCallback, Handle, StopReason, Supervisor};
