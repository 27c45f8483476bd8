//! aiota-bootstrap — brings an AiotA host up and hands it to the controller.
//!
//! The [`BootstrapCoordinator`] runs a strictly ordered, fail-fast pipeline:
//!
//! 1. connect to the shared store
//! 2. read or create the platform configuration ([`ConfigStore`])
//! 3. ensure the log directory exists
//! 4. probe the controller port ([`PortProbe`]) as a single-instance guard
//! 5. clear stale process records ([`StoreRegistry`])
//! 6. spawn the controller under the supervisor
//!
//! Every collaborator sits behind a trait so the pipeline can be exercised
//! with fakes.

pub mod config_store;
pub mod coordinator;
pub mod error;
pub mod fs;
pub mod log;
pub mod probe;
pub mod registry;

pub use config_store::{ConfigSource, ConfigStore, HostIdentity, SystemHost};
pub use coordinator::{
    BootstrapCoordinator, BootstrapSettings, Launched, RedbConnector, Spawner, StoreConnector,
};
pub use error::{BootstrapError, BootstrapResult};
pub use fs::{DirectoryEnsurer, StdFs, clean_logs};
pub use log::{EventLog, SourceIdentity, TracingLog};
pub use probe::{PortProbe, PortStatus, ProbeError, TcpPortProbe};
pub use registry::{ProcessRegistry, RegistryReset, StoreRegistry};
