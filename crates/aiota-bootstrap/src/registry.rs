//! ProcessRegistry — liveness records of supervised processes.

use std::time::Duration;

use aiota_state::{ProcessRecord, StateStore, process_key};
use tracing::{debug, info};

use crate::error::{BootstrapError, BootstrapResult};

/// The bootstrap step that wipes the registry before a fresh launch.
pub trait RegistryReset: Send + Sync {
    /// Delete every record and return how many were removed.
    fn reset(&self, store: &StateStore) -> BootstrapResult<u32>;
}

/// Resets the registry held in the shared store.
#[derive(Debug, Clone, Copy, Default)]
pub struct StoreRegistry;

impl RegistryReset for StoreRegistry {
    fn reset(&self, store: &StateStore) -> BootstrapResult<u32> {
        ProcessRegistry::new(store).clear()
    }
}

pub struct ProcessRegistry<'a> {
    store: &'a StateStore,
}

impl<'a> ProcessRegistry<'a> {
    pub fn new(store: &'a StateStore) -> Self {
        Self { store }
    }

    /// Delete every record. Clearing an empty registry succeeds.
    pub fn clear(&self) -> BootstrapResult<u32> {
        let removed = self.store.clear_processes().map_err(BootstrapError::Registry)?;
        info!(removed, "process registry cleared");
        Ok(removed)
    }

    /// Insert or replace the record for `record.host`/`record.pid`.
    pub fn register(&self, record: &ProcessRecord) -> BootstrapResult<()> {
        self.store
            .put_process(record)
            .map_err(BootstrapError::Registry)?;
        debug!(host = %record.host, pid = record.pid, role = %record.role, "process registered");
        Ok(())
    }

    /// Refresh a record's heartbeat. Returns false if no such record exists.
    pub fn heartbeat(&self, host: &str, pid: u32, now_ms: u64) -> BootstrapResult<bool> {
        let key = process_key(host, pid);
        let Some(mut record) = self
            .store
            .get_process(&key)
            .map_err(BootstrapError::Registry)?
        else {
            return Ok(false);
        };
        record.last_heartbeat = now_ms;
        self.store
            .put_process(&record)
            .map_err(BootstrapError::Registry)?;
        Ok(true)
    }

    pub fn list(&self) -> BootstrapResult<Vec<ProcessRecord>> {
        self.store.list_processes().map_err(BootstrapError::Registry)
    }

    /// Records whose last heartbeat is older than `threshold` at `now_ms`.
    pub fn stale(&self, threshold: Duration, now_ms: u64) -> BootstrapResult<Vec<ProcessRecord>> {
        let threshold_ms = threshold.as_millis() as u64;
        Ok(self
            .list()?
            .into_iter()
            .filter(|r| r.is_stale(threshold_ms, now_ms))
            .collect())
    }
}
