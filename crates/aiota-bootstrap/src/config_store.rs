//! ConfigStore — reads or lazily creates the singleton platform configuration.

use std::collections::BTreeMap;
use std::net::{IpAddr, Ipv4Addr, UdpSocket};
use std::sync::Arc;

use aiota_core::epoch_millis;
use aiota_state::*;
use tracing::{debug, info};

use crate::error::{BootstrapError, BootstrapResult};

/// Identity of the machine the launcher runs on.
pub trait HostIdentity: Send + Sync {
    fn hostname(&self) -> String;
    /// Address other hosts reach this one on.
    fn address(&self) -> String;
}

/// Detects identity from the running system.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemHost;

impl HostIdentity for SystemHost {
    fn hostname(&self) -> String {
        hostname::get()
            .map(|h| h.to_string_lossy().to_string())
            .unwrap_or_else(|_| "localhost".to_string())
    }

    fn address(&self) -> String {
        outbound_ipv4()
            .unwrap_or(Ipv4Addr::LOCALHOST)
            .to_string()
    }
}

/// First non-loopback IPv4 address, as picked by the routing table.
///
/// Connecting a UDP socket sends nothing; it only binds a local address.
fn outbound_ipv4() -> Option<Ipv4Addr> {
    let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).ok()?;
    socket.connect((Ipv4Addr::new(192, 0, 2, 1), 9)).ok()?;
    match socket.local_addr().ok()?.ip() {
        IpAddr::V4(ip) if !ip.is_loopback() && !ip.is_unspecified() => Some(ip),
        _ => None,
    }
}

/// Compiled-in platform defaults for a fresh deployment on `host`.
pub fn default_config(host: &dyn HostIdentity, now: u64) -> PlatformConfig {
    let mut ports = BTreeMap::new();
    ports.insert(CONTROLLER_SERVICE.to_string(), PortAssignment::Single(8000));
    ports.insert("ingestion".to_string(), PortAssignment::Single(8080));
    ports.insert(
        "longpolling".to_string(),
        PortAssignment::Range {
            start: 8100,
            end: 8199,
        },
    );

    PlatformConfig {
        id: CONFIG_ID,
        server: ServerIdentity {
            name: host.hostname(),
            address: host.address(),
        },
        tls: TlsSettings {
            enabled: false,
            key_path: "/etc/aiota/ssl/server.key".to_string(),
            cert_path: "/etc/aiota/ssl/server.crt".to_string(),
        },
        ports,
        database: DatabaseParams {
            host: "localhost".to_string(),
            port: 27017,
            name: "aiota".to_string(),
            user: None,
            password: None,
        },
        broker: BrokerParams {
            protocol: "amqp".to_string(),
            host: "localhost".to_string(),
            port: 5672,
            user: "guest".to_string(),
            password: "guest".to_string(),
            vhost: "/".to_string(),
        },
        paths: PathSettings {
            install_root: "/usr/local/lib/aiota".to_string(),
            log_dir: "/var/log/aiota".to_string(),
        },
        created_at: now,
    }
}

/// Source of the singleton platform configuration.
pub trait ConfigSource: Send + Sync {
    /// Return the stored configuration, creating it on first use.
    ///
    /// The flag is `true` when this call created the record. An existing
    /// record is returned as stored.
    fn get_or_create(&self, store: &StateStore) -> BootstrapResult<(PlatformConfig, bool)>;
}

/// Keeps the configuration in the shared store, seeded from [`default_config`].
pub struct ConfigStore {
    host: Arc<dyn HostIdentity>,
}

impl ConfigStore {
    pub fn new(host: Arc<dyn HostIdentity>) -> Self {
        Self { host }
    }
}

impl ConfigSource for ConfigStore {
    fn get_or_create(&self, store: &StateStore) -> BootstrapResult<(PlatformConfig, bool)> {
        let (config, created) = store
            .get_or_insert_config(|| default_config(self.host.as_ref(), epoch_millis()))
            .map_err(BootstrapError::Config)?;

        if created {
            info!(server = %config.server.name, address = %config.server.address, "platform configuration created");
        } else {
            debug!(server = %config.server.name, "platform configuration loaded");
        }
        Ok((config, created))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedHost;

    impl HostIdentity for FixedHost {
        fn hostname(&self) -> String {
            "node-1".to_string()
        }

        fn address(&self) -> String {
            "10.0.0.5".to_string()
        }
    }

    #[test]
    fn defaults_follow_platform_conventions() {
        let config = default_config(&FixedHost, 42);
        assert_eq!(config.id, CONFIG_ID);
        assert_eq!(config.server.name, "node-1");
        assert_eq!(config.server.address, "10.0.0.5");
        assert_eq!(config.controller_port(), Some(8000));
        assert_eq!(
            config.port("longpolling"),
            Some(PortAssignment::Range {
                start: 8100,
                end: 8199
            })
        );
        assert_eq!(config.port("telemetry"), None);
        assert!(!config.tls.enabled);
        assert_eq!(config.paths.log_dir, "/var/log/aiota");
        assert_eq!(config.created_at, 42);
    }

    #[test]
    fn get_or_create_is_idempotent() {
        let store = StateStore::open_in_memory().unwrap();
        let config_store = ConfigStore::new(Arc::new(FixedHost));

        let (first, created) = config_store.get_or_create(&store).unwrap();
        assert!(created);
        let (second, created) = config_store.get_or_create(&store).unwrap();
        assert!(!created);
        assert_eq!(first, second);
    }

    #[test]
    fn existing_record_is_not_modified() {
        let store = StateStore::open_in_memory().unwrap();
        let mut custom = default_config(&FixedHost, 1);
        custom.server.name = "edge-7".to_string();
        custom.tls.enabled = true;
        store.put_config(&custom).unwrap();

        let (config, created) = ConfigStore::new(Arc::new(FixedHost))
            .get_or_create(&store)
            .unwrap();
        assert!(!created);
        assert_eq!(config, custom);
    }

    #[test]
    fn system_host_has_an_address() {
        let address = SystemHost.address();
        assert!(address.parse::<Ipv4Addr>().is_ok());
        assert!(!SystemHost.hostname().is_empty());
    }
}
