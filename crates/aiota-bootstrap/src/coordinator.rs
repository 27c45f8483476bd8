//! BootstrapCoordinator — the fail-fast startup pipeline.
//!
//! Steps run strictly in order and the first failure ends the run. Each
//! failure is logged once, with the launcher's identity and the server name,
//! before it is returned. Nothing is retried here.
//!
//! The store is released before the controller is spawned: redb locks its
//! file per process, and the controller opens the same store itself using
//! the URI passed in its environment.

use std::future::Future;
use std::path::Path;
use std::sync::Arc;

use aiota_core::config::{ControllerSection, LauncherConfig};
use aiota_core::{ProbePolicy, StoreUri};
use aiota_state::{CONFIG_ID, CONTROLLER_SERVICE, LogLevel, PlatformConfig, StateResult, StateStore};
use aiota_supervisor::{
    ChildDescriptor, EventCallback, Handle, RestartPolicy, StopReason, Supervisor,
    SupervisorEvent,
};
use tracing::info;

use crate::config_store::{ConfigSource, ConfigStore, HostIdentity, SystemHost};
use crate::error::{BootstrapError, BootstrapResult};
use crate::fs::{DirectoryEnsurer, StdFs};
use crate::log::{EventLog, SourceIdentity, TracingLog};
use crate::probe::{PortProbe, PortStatus, TcpPortProbe};
use crate::registry::{RegistryReset, StoreRegistry};

/// Store URI the controller connects to.
pub const ENV_STORE_URI: &str = "AIOTA_STORE_URI";
/// Key of the configuration record.
pub const ENV_CONFIG_ID: &str = "AIOTA_CONFIG_ID";
pub const ENV_SERVER_NAME: &str = "AIOTA_SERVER_NAME";
pub const ENV_CONTROLLER_PORT: &str = "AIOTA_CONTROLLER_PORT";

// ── Collaborator seams ─────────────────────────────────────────────

pub trait StoreConnector: Send + Sync {
    fn connect(&self, uri: &StoreUri) -> StateResult<StateStore>;
}

/// Opens redb stores (or in-memory ones for `memory:`).
#[derive(Debug, Clone, Copy, Default)]
pub struct RedbConnector;

impl StoreConnector for RedbConnector {
    fn connect(&self, uri: &StoreUri) -> StateResult<StateStore> {
        StateStore::connect(uri)
    }
}

/// Starts the supervised controller.
pub trait Spawner: Send + Sync {
    fn spawn(&self, desc: ChildDescriptor, observer: EventCallback) -> Handle;
}

impl Spawner for Supervisor {
    fn spawn(&self, desc: ChildDescriptor, observer: EventCallback) -> Handle {
        self.clone().with_observer(observer).spawn(desc)
    }
}

// ── Settings ───────────────────────────────────────────────────────

/// Resolved launcher settings.
#[derive(Debug, Clone)]
pub struct BootstrapSettings {
    pub store_uri: StoreUri,
    pub controller: ControllerSection,
    pub restart: RestartPolicy,
    pub probe_host: String,
    pub probe_timeout: std::time::Duration,
    pub probe_policy: ProbePolicy,
}

impl BootstrapSettings {
    pub fn from_config(config: &LauncherConfig) -> BootstrapResult<Self> {
        Ok(Self {
            store_uri: config.store_uri()?,
            controller: config.controller.clone(),
            restart: RestartPolicy::from_section(&config.controller.restart)?,
            probe_host: config.probe.host.clone(),
            probe_timeout: config.probe.timeout()?,
            probe_policy: config.probe.policy,
        })
    }
}

/// A controller that made it through bootstrap.
#[derive(Debug)]
pub struct Launched {
    pub config: PlatformConfig,
    pub handle: Handle,
}

// ── Coordinator ────────────────────────────────────────────────────

pub struct BootstrapCoordinator {
    settings: BootstrapSettings,
    source: SourceIdentity,
    connector: Arc<dyn StoreConnector>,
    host: Arc<dyn HostIdentity>,
    configs: Arc<dyn ConfigSource>,
    fs: Arc<dyn DirectoryEnsurer>,
    probe: Arc<dyn PortProbe>,
    registry: Arc<dyn RegistryReset>,
    spawner: Arc<dyn Spawner>,
    log: Arc<dyn EventLog>,
}

impl BootstrapCoordinator {
    /// Coordinator wired to the real system.
    pub fn new(settings: BootstrapSettings) -> Self {
        let probe = TcpPortProbe::new(settings.probe_timeout);
        let host: Arc<dyn HostIdentity> = Arc::new(SystemHost);
        Self {
            settings,
            source: SourceIdentity::current("aiota"),
            connector: Arc::new(RedbConnector),
            configs: Arc::new(ConfigStore::new(host.clone())),
            host,
            fs: Arc::new(StdFs),
            probe: Arc::new(probe),
            registry: Arc::new(StoreRegistry),
            spawner: Arc::new(Supervisor::os()),
            log: Arc::new(TracingLog),
        }
    }

    pub fn with_source(mut self, source: SourceIdentity) -> Self {
        self.source = source;
        self
    }

    pub fn with_connector(mut self, connector: Arc<dyn StoreConnector>) -> Self {
        self.connector = connector;
        self
    }

    /// Replaces the host identity, and the configuration source with a
    /// [`ConfigStore`] seeded from that host.
    pub fn with_host(mut self, host: Arc<dyn HostIdentity>) -> Self {
        self.configs = Arc::new(ConfigStore::new(host.clone()));
        self.host = host;
        self
    }

    pub fn with_config_source(mut self, configs: Arc<dyn ConfigSource>) -> Self {
        self.configs = configs;
        self
    }

    pub fn with_fs(mut self, fs: Arc<dyn DirectoryEnsurer>) -> Self {
        self.fs = fs;
        self
    }

    pub fn with_probe(mut self, probe: Arc<dyn PortProbe>) -> Self {
        self.probe = probe;
        self
    }

    pub fn with_registry(mut self, registry: Arc<dyn RegistryReset>) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_spawner(mut self, spawner: Arc<dyn Spawner>) -> Self {
        self.spawner = spawner;
        self
    }

    pub fn with_log(mut self, log: Arc<dyn EventLog>) -> Self {
        self.log = log;
        self
    }

    /// Run the pipeline and hand the controller to the supervisor.
    pub async fn launch(&self) -> BootstrapResult<Launched> {
        let mut server = self.host.hostname();

        let store = self
            .connector
            .connect(&self.settings.store_uri)
            .map_err(|source| {
                self.fail(
                    &server,
                    None,
                    BootstrapError::Connection {
                        uri: self.settings.store_uri.to_string(),
                        source,
                    },
                )
            })?;

        let (config, created) = self
            .configs
            .get_or_create(&store)
            .map_err(|e| self.fail(&server, Some(&store), e))?;
        server = config.server.name.clone();
        let verb = if created { "created" } else { "loaded" };
        self.note(&server, Some(&store), LogLevel::Info, &format!("platform configuration {verb}"));

        let log_dir = Path::new(&config.paths.log_dir);
        self.fs.ensure_dir(log_dir).map_err(|source| {
            self.fail(
                &server,
                Some(&store),
                BootstrapError::Directory {
                    path: log_dir.display().to_string(),
                    source,
                },
            )
        })?;

        let port = config.controller_port().ok_or_else(|| {
            self.fail(
                &server,
                Some(&store),
                BootstrapError::NoControllerPort {
                    service: CONTROLLER_SERVICE.to_string(),
                },
            )
        })?;
        self.guard_port(&server, &store, port).await?;

        let removed = self
            .registry
            .reset(&store)
            .map_err(|e| self.fail(&server, Some(&store), e))?;
        self.note(
            &server,
            Some(&store),
            LogLevel::Debug,
            &format!("cleared {removed} stale process records"),
        );

        let desc = self.controller_descriptor(&config);
        self.note(
            &server,
            Some(&store),
            LogLevel::Info,
            &format!("launching {} ({})", desc.role, desc.program.display()),
        );
        drop(store);

        let handle = self.spawner.spawn(desc, self.observer(&server));
        info!(handle = handle.id(), role = %handle.role(), "controller handed off");
        Ok(Launched { config, handle })
    }

    /// Launch, then host the supervisor until it stops or `shutdown` resolves.
    pub async fn run<F>(&self, shutdown: F) -> BootstrapResult<StopReason>
    where
        F: Future<Output = ()>,
    {
        let launched = self.launch().await?;
        self.host_until(launched, shutdown).await
    }

    /// Passive hosting phase after a successful launch.
    ///
    /// On `shutdown` the controller tree is stopped. Exhausting the
    /// controller's restarts is an error.
    pub async fn host_until<F>(&self, launched: Launched, shutdown: F) -> BootstrapResult<StopReason>
    where
        F: Future<Output = ()>,
    {
        let Launched { config, handle } = launched;
        let server = config.server.name;

        let signalled = tokio::select! {
            res = handle.wait() => Some(res),
            _ = shutdown => None,
        };
        let reason = match signalled {
            Some(res) => res?,
            None => {
                self.note(&server, None, LogLevel::Info, "shutdown requested, stopping controller");
                handle.shutdown().await?
            }
        };

        match reason {
            StopReason::Exhausted => Err(self.fail(
                &server,
                None,
                BootstrapError::ControllerExhausted {
                    role: handle.role().to_string(),
                    restarts: handle.restarts(),
                },
            )),
            StopReason::Requested => {
                self.note(&server, None, LogLevel::Info, "controller stopped");
                Ok(reason)
            }
        }
    }

    /// Child descriptor for the controller, carrying the store parameters.
    pub fn controller_descriptor(&self, config: &PlatformConfig) -> ChildDescriptor {
        let controller = &self.settings.controller;
        let uri = self.settings.store_uri.to_string();

        let mut desc = ChildDescriptor::new(controller.role.as_str(), controller.program())
            .with_cwd(controller.root.as_path())
            .with_args(controller.args.iter().cloned())
            .with_arg("--store")
            .with_arg(uri.as_str())
            .with_env(ENV_STORE_URI, uri)
            .with_env(ENV_CONFIG_ID, CONFIG_ID.to_string())
            .with_env(ENV_SERVER_NAME, config.server.name.as_str())
            .with_restart(self.settings.restart.clone())
            .log_to(Path::new(&config.paths.log_dir));
        if let Some(port) = config.controller_port() {
            desc = desc.with_env(ENV_CONTROLLER_PORT, port.to_string());
        }
        desc
    }

    async fn guard_port(&self, server: &str, store: &StateStore, port: u16) -> BootstrapResult<()> {
        let host = self.settings.probe_host.as_str();
        match self.probe.check(host, port).await {
            Ok(PortStatus::Closed) => Ok(()),
            Ok(PortStatus::Open) => Err(self.fail(
                server,
                Some(store),
                BootstrapError::PortConflict {
                    host: host.to_string(),
                    port,
                },
            )),
            // An inconclusive check is always a warning; the policy decides
            // whether it also ends the run.
            Err(e) => match self.settings.probe_policy {
                ProbePolicy::Abort => {
                    self.note(server, Some(store), LogLevel::Warn, &format!("{e}; aborting launch"));
                    Err(self.fail(server, Some(store), e.into()))
                }
                ProbePolicy::Proceed => {
                    self.note(
                        server,
                        Some(store),
                        LogLevel::Warn,
                        &format!("{e}; proceeding as if the port were free"),
                    );
                    Ok(())
                }
            },
        }
    }

    /// Supervisor events go to the log without a store handle.
    fn observer(&self, server: &str) -> EventCallback {
        let log = self.log.clone();
        let source = self.source.clone();
        let server = server.to_string();
        Arc::new(move |event: &SupervisorEvent| {
            let level = if event.kind.is_failure() {
                LogLevel::Error
            } else {
                LogLevel::Info
            };
            log.log(&source, &server, None, level, &event.to_string());
        })
    }

    fn note(&self, server: &str, store: Option<&StateStore>, level: LogLevel, message: &str) {
        self.log.log(&self.source, server, store, level, message);
    }

    fn fail(&self, server: &str, store: Option<&StateStore>, err: BootstrapError) -> BootstrapError {
        self.log.log(&self.source, server, store, LogLevel::Error, &err.to_string());
        err
    }
}
