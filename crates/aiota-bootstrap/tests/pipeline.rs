//! Bootstrap pipeline tests.
//!
//! Every collaborator is replaced with a recording fake so the tests can
//! check step ordering and short-circuiting. The store is an in-memory redb
//! shared between the fake connector and the test body.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use aiota_bootstrap::coordinator::{ENV_CONFIG_ID, ENV_CONTROLLER_PORT, ENV_SERVER_NAME, ENV_STORE_URI};
use aiota_bootstrap::*;
use aiota_core::config::LauncherConfig;
use aiota_core::{ProbePolicy, StoreUri};
use aiota_state::*;
use aiota_supervisor::*;

// ── Fakes ──────────────────────────────────────────────────────────

struct FakeConnector {
    store: Option<StateStore>,
    calls: AtomicU32,
}

impl StoreConnector for FakeConnector {
    fn connect(&self, _uri: &StoreUri) -> StateResult<StateStore> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.store
            .clone()
            .ok_or_else(|| StateError::Open("connection refused".to_string()))
    }
}

struct FixedHost;

impl HostIdentity for FixedHost {
    fn hostname(&self) -> String {
        "node-1".to_string()
    }

    fn address(&self) -> String {
        "10.0.0.5".to_string()
    }
}

/// Configuration source whose store reads always fail.
struct CorruptConfig;

impl ConfigSource for CorruptConfig {
    fn get_or_create(&self, _store: &StateStore) -> BootstrapResult<(PlatformConfig, bool)> {
        Err(BootstrapError::Config(StateError::Deserialize(
            "expected value at line 1 column 1".to_string(),
        )))
    }
}

/// Registry whose reset fails after recording the attempt.
#[derive(Default)]
struct FailingRegistry {
    calls: AtomicU32,
}

impl RegistryReset for FailingRegistry {
    fn reset(&self, _store: &StateStore) -> BootstrapResult<u32> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(BootstrapError::Registry(StateError::Write(
            "database is read-only".to_string(),
        )))
    }
}

#[derive(Default)]
struct RecordingFs {
    calls: Mutex<Vec<std::path::PathBuf>>,
    fail: bool,
}

impl DirectoryEnsurer for RecordingFs {
    fn ensure_dir(&self, path: &std::path::Path) -> std::io::Result<()> {
        self.calls.lock().unwrap().push(path.to_path_buf());
        if self.fail {
            Err(std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only"))
        } else {
            Ok(())
        }
    }
}

#[derive(Clone, Copy)]
enum ProbeOutcome {
    Open,
    Closed,
    Inconclusive,
}

struct FakeProbe {
    outcome: ProbeOutcome,
    calls: Mutex<Vec<(String, u16)>>,
}

impl PortProbe for FakeProbe {
    fn check<'a>(&'a self, host: &'a str, port: u16) -> BoxFuture<'a, Result<PortStatus, ProbeError>> {
        self.calls.lock().unwrap().push((host.to_string(), port));
        let outcome = self.outcome;
        Box::pin(async move {
            match outcome {
                ProbeOutcome::Open => Ok(PortStatus::Open),
                ProbeOutcome::Closed => Ok(PortStatus::Closed),
                ProbeOutcome::Inconclusive => Err(ProbeError::Timeout {
                    addr: format!("{host}:{port}"),
                    timeout: Duration::from_secs(1),
                }),
            }
        })
    }
}

/// Children run until terminated, or fail to spawn when `fail` is set.
struct IdleLauncher {
    fail: bool,
}

struct IdleChild;

impl ChildProcess for IdleChild {
    fn id(&self) -> Option<u32> {
        Some(4242)
    }

    fn wait(&mut self) -> BoxFuture<'_, SupervisorResult<ExitInfo>> {
        Box::pin(std::future::pending())
    }

    fn terminate(&mut self, _kill_tree: bool, _grace: Duration) -> BoxFuture<'_, SupervisorResult<ExitInfo>> {
        Box::pin(async { Ok(ExitInfo::signal(15)) })
    }
}

impl ProcessLauncher for IdleLauncher {
    fn launch(&self, desc: &ChildDescriptor) -> SupervisorResult<Box<dyn ChildProcess>> {
        if self.fail {
            return Err(SupervisorError::Spawn {
                program: desc.program.display().to_string(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "missing"),
            });
        }
        Ok(Box::new(IdleChild))
    }
}

struct RecordingSpawner {
    supervisor: Supervisor,
    spawned: Mutex<Vec<ChildDescriptor>>,
}

impl Spawner for RecordingSpawner {
    fn spawn(&self, desc: ChildDescriptor, observer: EventCallback) -> Handle {
        self.spawned.lock().unwrap().push(desc.clone());
        Spawner::spawn(&self.supervisor, desc, observer)
    }
}

#[derive(Default)]
struct RecordingLog {
    entries: Mutex<Vec<(LogLevel, String, bool)>>,
}

impl RecordingLog {
    fn count(&self, level: LogLevel) -> usize {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .filter(|(l, _, _)| *l == level)
            .count()
    }

    fn contains(&self, needle: &str) -> bool {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .any(|(_, message, _)| message.contains(needle))
    }
}

impl EventLog for RecordingLog {
    fn log(
        &self,
        _source: &SourceIdentity,
        _server: &str,
        store: Option<&StateStore>,
        level: LogLevel,
        message: &str,
    ) {
        self.entries
            .lock()
            .unwrap()
            .push((level, message.to_string(), store.is_some()));
    }
}

// ── Harness ────────────────────────────────────────────────────────

struct Harness {
    store: StateStore,
    connector: Arc<FakeConnector>,
    fs: Arc<RecordingFs>,
    probe: Arc<FakeProbe>,
    spawner: Arc<RecordingSpawner>,
    log: Arc<RecordingLog>,
}

impl Harness {
    fn new(probe: ProbeOutcome) -> Self {
        let store = StateStore::open_in_memory().unwrap();
        Self {
            connector: Arc::new(FakeConnector {
                store: Some(store.clone()),
                calls: AtomicU32::new(0),
            }),
            store,
            fs: Arc::new(RecordingFs::default()),
            probe: Arc::new(FakeProbe {
                outcome: probe,
                calls: Mutex::new(Vec::new()),
            }),
            spawner: Arc::new(RecordingSpawner {
                supervisor: Supervisor::new(Arc::new(IdleLauncher { fail: false })),
                spawned: Mutex::new(Vec::new()),
            }),
            log: Arc::new(RecordingLog::default()),
        }
    }

    fn unreachable_store(mut self) -> Self {
        self.connector = Arc::new(FakeConnector {
            store: None,
            calls: AtomicU32::new(0),
        });
        self
    }

    fn failing_fs(mut self) -> Self {
        self.fs = Arc::new(RecordingFs {
            fail: true,
            ..RecordingFs::default()
        });
        self
    }

    fn failing_spawns(mut self) -> Self {
        self.spawner = Arc::new(RecordingSpawner {
            supervisor: Supervisor::new(Arc::new(IdleLauncher { fail: true })),
            spawned: Mutex::new(Vec::new()),
        });
        self
    }

    fn settings(policy: ProbePolicy) -> BootstrapSettings {
        let mut config = LauncherConfig::default();
        config.store.uri = "redb:///var/lib/aiota/aiota.redb".to_string();
        config.probe.policy = policy;
        config.controller.restart.max_restarts = 1;
        config.controller.restart.spin_sleep = "5ms".to_string();
        BootstrapSettings::from_config(&config).unwrap()
    }

    fn coordinator(&self, policy: ProbePolicy) -> BootstrapCoordinator {
        BootstrapCoordinator::new(Self::settings(policy))
            .with_source(SourceIdentity::new("aiota", 1))
            .with_connector(self.connector.clone())
            .with_host(Arc::new(FixedHost))
            .with_fs(self.fs.clone())
            .with_probe(self.probe.clone())
            .with_spawner(self.spawner.clone())
            .with_log(self.log.clone())
    }

    fn seed_stale_records(&self) {
        for pid in [100, 101] {
            self.store
                .put_process(&ProcessRecord {
                    host: "node-1".to_string(),
                    pid,
                    role: "ingestion".to_string(),
                    started_at: 0,
                    last_heartbeat: 0,
                })
                .unwrap();
        }
    }

    fn fs_calls(&self) -> usize {
        self.fs.calls.lock().unwrap().len()
    }

    fn probe_calls(&self) -> usize {
        self.probe.calls.lock().unwrap().len()
    }

    fn spawn_calls(&self) -> usize {
        self.spawner.spawned.lock().unwrap().len()
    }
}

// ── Tests ──────────────────────────────────────────────────────────

#[tokio::test]
async fn closed_port_clears_registry_then_spawns_controller_once() {
    let harness = Harness::new(ProbeOutcome::Closed);
    harness.seed_stale_records();

    let launched = harness.coordinator(ProbePolicy::Abort).launch().await.unwrap();

    assert!(harness.store.list_processes().unwrap().is_empty());
    assert_eq!(harness.spawn_calls(), 1);
    assert_eq!(harness.fs_calls(), 1);
    assert_eq!(
        harness.probe.calls.lock().unwrap().as_slice(),
        &[("127.0.0.1".to_string(), 8000)]
    );
    assert!(harness.log.contains("cleared 2 stale process records"));
    assert_eq!(harness.log.count(LogLevel::Error), 0);

    assert_eq!(launched.config.server.name, "node-1");
    assert_eq!(launched.handle.role(), "controller");
    launched.handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn open_port_aborts_before_registry_and_spawn() {
    let harness = Harness::new(ProbeOutcome::Open);
    harness.seed_stale_records();

    let err = harness.coordinator(ProbePolicy::Abort).launch().await.unwrap_err();

    assert!(matches!(err, BootstrapError::PortConflict { port: 8000, .. }));
    assert_ne!(err.exit_code(), 0);
    assert_eq!(harness.store.list_processes().unwrap().len(), 2);
    assert_eq!(harness.spawn_calls(), 0);
    assert_eq!(harness.log.count(LogLevel::Error), 1);
}

#[tokio::test]
async fn store_failure_stops_at_the_first_step() {
    let harness = Harness::new(ProbeOutcome::Closed).unreachable_store();

    let err = harness.coordinator(ProbePolicy::Abort).launch().await.unwrap_err();

    assert!(matches!(err, BootstrapError::Connection { .. }));
    assert_eq!(err.exit_code(), 1);
    assert_eq!(harness.connector.calls.load(Ordering::SeqCst), 1);
    assert_eq!(harness.fs_calls(), 0);
    assert_eq!(harness.probe_calls(), 0);
    assert_eq!(harness.spawn_calls(), 0);
    assert_eq!(harness.log.count(LogLevel::Error), 1);
    // No store handle exists yet, so the failure is logged without one.
    assert!(harness.log.entries.lock().unwrap().iter().all(|(_, _, with_store)| !with_store));
}

#[tokio::test]
async fn directory_failure_stops_before_probe() {
    let harness = Harness::new(ProbeOutcome::Closed).failing_fs();

    let err = harness.coordinator(ProbePolicy::Abort).launch().await.unwrap_err();

    assert!(matches!(err, BootstrapError::Directory { .. }));
    assert_eq!(harness.probe_calls(), 0);
    assert_eq!(harness.spawn_calls(), 0);
    assert_eq!(harness.log.count(LogLevel::Error), 1);
}

#[tokio::test]
async fn inconclusive_probe_aborts_by_default() {
    let harness = Harness::new(ProbeOutcome::Inconclusive);

    let err = harness.coordinator(ProbePolicy::Abort).launch().await.unwrap_err();

    assert!(matches!(err, BootstrapError::PortProbe(_)));
    assert_eq!(err.exit_code(), 1);
    assert_eq!(harness.spawn_calls(), 0);
    // Warned about first, then reported once as the fatal error.
    assert_eq!(harness.log.count(LogLevel::Warn), 1);
    assert_eq!(harness.log.count(LogLevel::Error), 1);
    let levels: Vec<LogLevel> = harness.log.entries.lock().unwrap().iter().map(|(l, _, _)| *l).collect();
    let warn_at = levels.iter().position(|l| *l == LogLevel::Warn).unwrap();
    let error_at = levels.iter().position(|l| *l == LogLevel::Error).unwrap();
    assert!(warn_at < error_at);
}

#[tokio::test]
async fn unreadable_configuration_aborts_before_any_side_effect() {
    let harness = Harness::new(ProbeOutcome::Closed);
    harness.seed_stale_records();

    let err = harness
        .coordinator(ProbePolicy::Abort)
        .with_config_source(Arc::new(CorruptConfig))
        .launch()
        .await
        .unwrap_err();

    assert!(matches!(err, BootstrapError::Config(StateError::Deserialize(_))));
    assert_eq!(err.exit_code(), 1);
    assert_eq!(harness.fs_calls(), 0);
    assert_eq!(harness.probe_calls(), 0);
    assert_eq!(harness.spawn_calls(), 0);
    assert_eq!(harness.store.list_processes().unwrap().len(), 2);
    assert_eq!(harness.log.count(LogLevel::Error), 1);
}

#[tokio::test]
async fn registry_failure_aborts_before_spawn() {
    let harness = Harness::new(ProbeOutcome::Closed);
    harness.seed_stale_records();
    let registry = Arc::new(FailingRegistry::default());

    let err = harness
        .coordinator(ProbePolicy::Abort)
        .with_registry(registry.clone())
        .launch()
        .await
        .unwrap_err();

    assert!(matches!(err, BootstrapError::Registry(_)));
    assert_eq!(err.exit_code(), 1);
    assert_eq!(registry.calls.load(Ordering::SeqCst), 1);
    assert_eq!(harness.fs_calls(), 1);
    assert_eq!(harness.probe_calls(), 1);
    assert_eq!(harness.spawn_calls(), 0);
    assert_eq!(harness.store.list_processes().unwrap().len(), 2);
    assert_eq!(harness.log.count(LogLevel::Error), 1);
    assert!(!harness.log.contains("launching"));
}

#[tokio::test]
async fn inconclusive_probe_proceeds_when_allowed() {
    let harness = Harness::new(ProbeOutcome::Inconclusive);

    let launched = harness.coordinator(ProbePolicy::Proceed).launch().await.unwrap();

    assert_eq!(harness.spawn_calls(), 1);
    assert_eq!(harness.log.count(LogLevel::Warn), 1);
    launched.handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn configuration_is_created_once_and_reused() {
    let harness = Harness::new(ProbeOutcome::Closed);

    let first = harness.coordinator(ProbePolicy::Abort).launch().await.unwrap();
    first.handle.shutdown().await.unwrap();
    let second = harness.coordinator(ProbePolicy::Abort).launch().await.unwrap();
    second.handle.shutdown().await.unwrap();

    assert_eq!(first.config, second.config);
    assert_eq!(harness.store.get_config().unwrap(), Some(first.config));
    assert!(harness.log.contains("platform configuration created"));
    assert!(harness.log.contains("platform configuration loaded"));
}

#[tokio::test]
async fn controller_descriptor_carries_store_parameters() {
    let harness = Harness::new(ProbeOutcome::Closed);
    let launched = harness.coordinator(ProbePolicy::Abort).launch().await.unwrap();
    launched.handle.shutdown().await.unwrap();

    let spawned = harness.spawner.spawned.lock().unwrap();
    let desc = &spawned[0];
    assert_eq!(desc.role, "controller");
    assert_eq!(desc.env_var(ENV_STORE_URI), Some("redb:///var/lib/aiota/aiota.redb"));
    assert_eq!(desc.env_var(ENV_CONFIG_ID), Some("0"));
    assert_eq!(desc.env_var(ENV_SERVER_NAME), Some("node-1"));
    assert_eq!(desc.env_var(ENV_CONTROLLER_PORT), Some("8000"));
    assert!(desc.args.ends_with(&["--store".to_string(), "redb:///var/lib/aiota/aiota.redb".to_string()]));
    assert_eq!(
        desc.stdout,
        Output::File(std::path::PathBuf::from("/var/log/aiota/controller.out"))
    );
    assert_eq!(desc.restart.max_restarts, 1);
}

#[tokio::test]
async fn shutdown_signal_stops_the_controller() {
    let harness = Harness::new(ProbeOutcome::Closed);
    let coordinator = harness.coordinator(ProbePolicy::Abort);

    let reason = coordinator
        .run(tokio::time::sleep(Duration::from_millis(20)))
        .await
        .unwrap();

    assert_eq!(reason, StopReason::Requested);
    assert!(harness.log.contains("shutdown requested"));
    assert!(harness.log.contains("(stop requested)"));
}

#[tokio::test]
async fn exhausted_controller_fails_the_run() {
    let harness = Harness::new(ProbeOutcome::Closed).failing_spawns();
    let coordinator = harness.coordinator(ProbePolicy::Abort);

    let err = coordinator
        .run(std::future::pending::<()>())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        BootstrapError::ControllerExhausted { restarts: 1, .. }
    ));
    assert_eq!(err.exit_code(), 2);
    assert!(harness.log.contains("exhausted its restarts"));
}
