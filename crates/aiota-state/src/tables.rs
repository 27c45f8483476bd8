//! redb table definitions for the AiotA shared store.

use redb::TableDefinition;

/// The platform configuration record, keyed by [`crate::CONFIG_ID`].
pub const CONFIG: TableDefinition<u64, &[u8]> = TableDefinition::new("config");

/// Process registry keyed by `{host}:{pid}`.
pub const PROCESSES: TableDefinition<&str, &[u8]> = TableDefinition::new("processes");

/// Platform log keyed by sequence number.
pub const LOGS: TableDefinition<u64, &[u8]> = TableDefinition::new("logs");
