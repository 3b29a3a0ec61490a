//! Stand-in servers and isolated registries for the integration tests.

use std::net::TcpListener;
use std::sync::Arc;
use std::time::Duration;

use camino::Utf8PathBuf;
use nix::sys::signal::kill;
use nix::unistd::Pid;
use nosqlkit_config::{EngineConfig, EngineKind, ReadinessSettings};
use nosqlkit_engines::{ProcessEngine, ServerCommand, ServerInstance};
use nosqlkit_lifecycle::{
    ConnectionRegistry, EngineIdentity, KeyedInstanceRegistry, ResourceLifecycleManager,
};
use tempfile::TempDir;

pub const READY_MARKER: &str = "Waiting for connections";

/// Scratch directory plus registries private to one test.
pub struct Fixture {
    root: TempDir,
    pub connections: Arc<ConnectionRegistry>,
    pub instances: Arc<KeyedInstanceRegistry<ServerInstance>>,
}

impl Fixture {
    pub fn new() -> Self {
        Self {
            root: TempDir::new().expect("temp dir"),
            connections: Arc::new(ConnectionRegistry::new()),
            instances: Arc::new(KeyedInstanceRegistry::new()),
        }
    }

    pub fn path(&self, name: &str) -> Utf8PathBuf {
        Utf8PathBuf::from_path_buf(self.root.path().join(name)).expect("utf-8 temp dir")
    }

    pub fn config(&self, name: &str, port: u16, readiness: ReadinessSettings) -> EngineConfig {
        EngineConfig::builder(EngineKind::MongoDb)
            .engine_path(self.path("home"))
            .target_path(self.path(name))
            .port(port)
            .launch_timeout(Duration::from_secs(5))
            .shutdown_grace(Duration::from_millis(500))
            .readiness(readiness)
            .build_with_env(|_| None)
            .expect("valid config")
    }

    pub fn manager(
        &self,
        config: EngineConfig,
        command: ServerCommand,
    ) -> ResourceLifecycleManager<ProcessEngine> {
        let identity = EngineIdentity::from_config(&config);
        ResourceLifecycleManager::with_registries(
            identity,
            ProcessEngine::with_command(config, command),
            Arc::clone(&self.connections),
            Arc::clone(&self.instances),
        )
    }
}

/// A `/bin/sh` script standing in for a server binary.
pub fn shell(script: &str) -> ServerCommand {
    ServerCommand::new("/bin/sh").arg("-c").arg(script)
}

/// Console readiness waiting for [`READY_MARKER`].
pub fn console_ready() -> ReadinessSettings {
    ReadinessSettings::console_marker(READY_MARKER, 0, Duration::from_secs(5))
}

/// A port nothing listens on once the probe runs.
pub fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind ephemeral port");
    listener.local_addr().expect("local addr").port()
}

pub fn process_exists(pid: u32) -> bool {
    let raw = i32::try_from(pid).expect("pid fits in i32");
    kill(Pid::from_raw(raw), None).is_ok()
}
