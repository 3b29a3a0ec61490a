//! Handle published for a running server process.

use std::sync::Arc;

use nosqlkit_config::EngineKind;
use nosqlkit_lifecycle::{ConnectionKey, KeyedInstanceRegistry, LifecycleError, TargetPath};

/// A running server as seen by configuration code.
///
/// Instances live in the process-wide registry while their engine runs;
/// [`ServerInstance::any_running`] and [`ServerInstance::running_at`] look
/// them up without holding the lifecycle manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerInstance {
    kind: EngineKind,
    key: ConnectionKey,
    target: TargetPath,
    pid: u32,
}

impl ServerInstance {
    /// Describes a server started for `kind` at `key`.
    #[must_use]
    pub const fn new(kind: EngineKind, key: ConnectionKey, target: TargetPath, pid: u32) -> Self {
        Self {
            kind,
            key,
            target,
            pid,
        }
    }

    /// Engine that is running.
    #[must_use]
    pub const fn kind(&self) -> EngineKind {
        self.kind
    }

    /// Endpoint the server listens on.
    #[must_use]
    pub const fn key(&self) -> &ConnectionKey {
        &self.key
    }

    /// Working directory of the server.
    #[must_use]
    pub const fn target(&self) -> &TargetPath {
        &self.target
    }

    /// Operating-system process id.
    #[must_use]
    pub const fn pid(&self) -> u32 {
        self.pid
    }

    /// URI a client driver would connect to, such as `mongodb://host:port`.
    #[must_use]
    pub fn connection_uri(&self) -> String {
        format!("{}://{}", scheme(self.kind), self.key)
    }

    /// Any server currently published in the process-wide registry.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::NoInstanceRegistered`] when no server runs.
    pub fn any_running() -> Result<Arc<Self>, LifecycleError> {
        KeyedInstanceRegistry::<Self>::global().get_any()
    }

    /// Server published for `target`, if it is running.
    #[must_use]
    pub fn running_at(target: &TargetPath) -> Option<Arc<Self>> {
        KeyedInstanceRegistry::<Self>::global().get(target)
    }
}

const fn scheme(kind: EngineKind) -> &'static str {
    match kind {
        EngineKind::MongoDb => "mongodb",
        EngineKind::Redis => "redis",
        EngineKind::Infinispan => "hotrod",
        EngineKind::HBase => "hbase",
        EngineKind::CouchDb
        | EngineKind::Elasticsearch
        | EngineKind::Neo4j
        | EngineKind::DynamoDb
        | EngineKind::InfluxDb => "http",
    }
}
