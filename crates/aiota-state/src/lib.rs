//! aiota-state — the shared store every AiotA process reads.
//!
//! Backed by [redb](https://docs.rs/redb), it holds the singleton platform
//! configuration record, the process registry, and the platform log.
//!
//! # Architecture
//!
//! All domain types are JSON-serialized into redb's `&[u8]` value columns.
//! Process records are keyed by `{host}:{pid}`; log entries by a monotonically
//! increasing sequence number; the configuration record by [`CONFIG_ID`].
//!
//! The `StateStore` is `Clone` + `Send` + `Sync` (backed by `Arc<Database>`).
//! redb holds an exclusive lock on the database file, so only one OS process
//! can have a given on-disk store open at a time.

pub mod error;
pub mod store;
pub mod tables;
pub mod types;

pub use error::{StateError, StateResult};
pub use store::StateStore;
pub use types::*;
