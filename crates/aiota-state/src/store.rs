//! StateStore — redb-backed persistence for the AiotA platform.
//!
//! Provides typed operations over the configuration record, the process
//! registry, and the platform log. All values are JSON-serialized into
//! redb's `&[u8]` value columns. The store supports both on-disk and
//! in-memory backends (the latter for tests and `memory:` URIs).

use std::path::Path;
use std::sync::Arc;

use aiota_core::StoreUri;
use redb::{Database, ReadableDatabase, ReadableTable};
use tracing::debug;

use crate::error::{StateError, StateResult};
use crate::tables::*;
use crate::types::*;

/// Convert any `Display` error into a `StateError` variant via a closure factory.
macro_rules! map_err {
    ($variant:ident) => {
        |e| StateError::$variant(e.to_string())
    };
}

/// Thread-safe state store backed by redb.
#[derive(Clone)]
pub struct StateStore {
    db: Arc<Database>,
}

impl std::fmt::Debug for StateStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateStore").finish_non_exhaustive()
    }
}

impl StateStore {
    /// Open the store a URI points at.
    pub fn connect(uri: &StoreUri) -> StateResult<Self> {
        debug!(scheme = uri.scheme(), %uri, "connecting to state store");
        match uri {
            StoreUri::Redb { path } => Self::open(path),
            StoreUri::Memory => Self::open_in_memory(),
        }
    }

    /// Open (or create) a persistent state store at the given path.
    pub fn open(path: &Path) -> StateResult<Self> {
        let db = Database::create(path).map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!(?path, "state store opened");
        Ok(store)
    }

    /// Create an ephemeral in-memory state store.
    pub fn open_in_memory() -> StateResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!("in-memory state store opened");
        Ok(store)
    }

    /// Create all tables if they don't exist yet.
    fn ensure_tables(&self) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        // Opening a table in a write transaction creates it if absent.
        txn.open_table(CONFIG).map_err(map_err!(Table))?;
        txn.open_table(PROCESSES).map_err(map_err!(Table))?;
        txn.open_table(LOGS).map_err(map_err!(Table))?;
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    // ── Configuration ──────────────────────────────────────────────

    /// Read the singleton configuration record.
    pub fn get_config(&self) -> StateResult<Option<PlatformConfig>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(CONFIG).map_err(map_err!(Table))?;
        let config = match table.get(CONFIG_ID).map_err(map_err!(Read))? {
            Some(guard) => Some(
                serde_json::from_slice::<PlatformConfig>(guard.value())
                    .map_err(map_err!(Deserialize))?,
            ),
            None => None,
        };
        Ok(config)
    }

    /// Return the configuration record, inserting `make()` first if there is none.
    ///
    /// Lookup and insert share one write transaction, so concurrent callers
    /// cannot both insert. The flag is `true` when the record was created.
    pub fn get_or_insert_config<F>(&self, make: F) -> StateResult<(PlatformConfig, bool)>
    where
        F: FnOnce() -> PlatformConfig,
    {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let result;
        {
            let mut table = txn.open_table(CONFIG).map_err(map_err!(Table))?;
            let existing = match table.get(CONFIG_ID).map_err(map_err!(Read))? {
                Some(guard) => Some(
                    serde_json::from_slice::<PlatformConfig>(guard.value())
                        .map_err(map_err!(Deserialize))?,
                ),
                None => None,
            };

            result = match existing {
                Some(config) => (config, false),
                None => {
                    let mut config = make();
                    config.id = CONFIG_ID;
                    let value = serde_json::to_vec(&config).map_err(map_err!(Serialize))?;
                    table
                        .insert(CONFIG_ID, value.as_slice())
                        .map_err(map_err!(Write))?;
                    (config, true)
                }
            };
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(created = result.1, "configuration record resolved");
        Ok(result)
    }

    /// Replace the configuration record.
    pub fn put_config(&self, config: &PlatformConfig) -> StateResult<()> {
        let value = serde_json::to_vec(config).map_err(map_err!(Serialize))?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(CONFIG).map_err(map_err!(Table))?;
            table
                .insert(CONFIG_ID, value.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    // ── Processes ──────────────────────────────────────────────────

    /// Insert or update a process record.
    pub fn put_process(&self, record: &ProcessRecord) -> StateResult<()> {
        let key = record.table_key();
        let value = serde_json::to_vec(record).map_err(map_err!(Serialize))?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(PROCESSES).map_err(map_err!(Table))?;
            table
                .insert(key.as_str(), value.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(%key, "process record stored");
        Ok(())
    }

    /// Get a process record by its `{host}:{pid}` key.
    pub fn get_process(&self, key: &str) -> StateResult<Option<ProcessRecord>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(PROCESSES).map_err(map_err!(Table))?;
        let record = match table.get(key).map_err(map_err!(Read))? {
            Some(guard) => Some(
                serde_json::from_slice::<ProcessRecord>(guard.value())
                    .map_err(map_err!(Deserialize))?,
            ),
            None => None,
        };
        Ok(record)
    }

    /// List all process records.
    pub fn list_processes(&self) -> StateResult<Vec<ProcessRecord>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(PROCESSES).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in table.iter().map_err(map_err!(Read))? {
            let (_, value) = entry.map_err(map_err!(Read))?;
            let record: ProcessRecord =
                serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
            results.push(record);
        }
        Ok(results)
    }

    /// Delete a process record by key. Returns true if it existed.
    pub fn delete_process(&self, key: &str) -> StateResult<bool> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let existed;
        {
            let mut table = txn.open_table(PROCESSES).map_err(map_err!(Table))?;
            existed = table.remove(key).map_err(map_err!(Write))?.is_some();
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(%key, existed, "process record deleted");
        Ok(existed)
    }

    /// Delete every process record. Returns the number deleted.
    pub fn clear_processes(&self) -> StateResult<u32> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let count;
        {
            let mut table = txn.open_table(PROCESSES).map_err(map_err!(Table))?;
            let mut keys = Vec::new();
            for entry in table.iter().map_err(map_err!(Read))? {
                let (key, _) = entry.map_err(map_err!(Read))?;
                keys.push(key.value().to_string());
            }
            count = keys.len() as u32;
            for key in &keys {
                table.remove(key.as_str()).map_err(map_err!(Write))?;
            }
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(count, "process registry cleared");
        Ok(count)
    }

    // ── Log ────────────────────────────────────────────────────────

    /// Append a log entry, assigning it the next sequence number.
    pub fn append_log(&self, entry: &LogEntry) -> StateResult<u64> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let seq;
        {
            let mut table = txn.open_table(LOGS).map_err(map_err!(Table))?;
            seq = match table.last().map_err(map_err!(Read))? {
                Some((key, _)) => key.value() + 1,
                None => 0,
            };
            let mut entry = entry.clone();
            entry.seq = seq;
            let value = serde_json::to_vec(&entry).map_err(map_err!(Serialize))?;
            table
                .insert(seq, value.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(seq)
    }

    /// The most recent `limit` log entries, oldest first.
    pub fn recent_logs(&self, limit: usize) -> StateResult<Vec<LogEntry>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(LOGS).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in table.iter().map_err(map_err!(Read))?.rev() {
            if results.len() >= limit {
                break;
            }
            let (_, value) = entry.map_err(map_err!(Read))?;
            let log: LogEntry =
                serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
            results.push(log);
        }
        results.reverse();
        Ok(results)
    }
}
