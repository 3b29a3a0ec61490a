//! Reference-counted start and stop of engines shared between test scopes.
//!
//! A [`ResourceLifecycleManager`] pairs an engine's identity (its endpoint
//! and working directory) with the [`EngineHooks`] that actually start and
//! stop it. Every manager for the same endpoint shares one reference count:
//! the first `start_engine` runs `do_start`, later ones only increment, and
//! the `stop_engine` that drops the count to zero runs `do_stop` and cleans
//! the working directory.

mod scope;
mod teardown;

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use nosqlkit_config::EngineConfig;
use tracing::{debug, info, warn};

use crate::error::LifecycleError;
use crate::key::{ConnectionKey, TargetPath};
use crate::registry::{Acquisition, ConnectionRegistry, KeyedInstanceRegistry, Release};
use crate::workspace::{cleanup_directory, reset_directory};

pub use scope::EngineScope;
use teardown::EngineTeardown;

pub(crate) const MANAGER_TARGET: &str = "nosqlkit_lifecycle::manager";

/// Engine-specific start and stop logic.
///
/// `do_start` runs at most once per endpoint at a time and must leave nothing
/// running when it fails. `do_stop` runs exactly once for each successful
/// `do_start`; its errors are logged but never stop the teardown.
pub trait EngineHooks: Send + 'static {
    /// Handle published in the instance registry while the engine runs.
    type Handle: Send + Sync + 'static;

    /// Starts the engine described by `identity`. The working directory
    /// exists and is empty when this is called.
    ///
    /// # Errors
    ///
    /// Returns a [`LifecycleError`] when the engine cannot be started.
    fn do_start(&mut self, identity: &EngineIdentity) -> Result<Arc<Self::Handle>, LifecycleError>;

    /// Stops whatever `do_start` created.
    ///
    /// # Errors
    ///
    /// Returns a [`LifecycleError`] describing the failure; the manager logs
    /// it and carries on.
    fn do_stop(&mut self) -> Result<(), LifecycleError>;
}

/// Which engine runs where.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineIdentity {
    engine: String,
    key: ConnectionKey,
    target: TargetPath,
}

impl EngineIdentity {
    /// Identity from explicit parts.
    #[must_use]
    pub fn new(engine: impl Into<String>, key: ConnectionKey, target: TargetPath) -> Self {
        Self {
            engine: engine.into(),
            key,
            target,
        }
    }

    /// Identity of the engine described by `config`.
    #[must_use]
    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(
            config.kind().to_string(),
            ConnectionKey::new(config.host(), config.port()),
            TargetPath::from(config.target_path()),
        )
    }

    /// Engine label.
    #[must_use]
    pub fn engine(&self) -> &str {
        &self.engine
    }

    /// Endpoint the engine listens on.
    #[must_use]
    pub const fn key(&self) -> &ConnectionKey {
        &self.key
    }

    /// Working directory.
    #[must_use]
    pub const fn target(&self) -> &TargetPath {
        &self.target
    }
}

/// What a call to [`ResourceLifecycleManager::start_engine`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    /// This call started the engine.
    Started,
    /// The engine was already running; the reference count went up.
    Shared {
        /// Reference count after this call.
        ref_count: usize,
    },
}

/// What a call to [`ResourceLifecycleManager::stop_engine`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// Other holders remain; the engine keeps running.
    Released {
        /// Reference count after this call.
        remaining: usize,
    },
    /// This call dropped the last reference and stopped the engine.
    Stopped,
    /// Nothing was running for this endpoint.
    NotRunning,
}

/// Shares one running engine between every test scope that asks for it.
pub struct ResourceLifecycleManager<H: EngineHooks> {
    identity: EngineIdentity,
    hooks: Arc<Mutex<H>>,
    connections: Arc<ConnectionRegistry>,
    instances: Arc<KeyedInstanceRegistry<H::Handle>>,
}

impl<H: EngineHooks> ResourceLifecycleManager<H> {
    /// Manager backed by the process-wide registries.
    #[must_use]
    pub fn new(identity: EngineIdentity, hooks: H) -> Self {
        Self::with_registries(
            identity,
            hooks,
            ConnectionRegistry::global(),
            KeyedInstanceRegistry::global(),
        )
    }

    /// Manager backed by caller-supplied registries.
    #[must_use]
    pub fn with_registries(
        identity: EngineIdentity,
        hooks: H,
        connections: Arc<ConnectionRegistry>,
        instances: Arc<KeyedInstanceRegistry<H::Handle>>,
    ) -> Self {
        Self {
            identity,
            hooks: Arc::new(Mutex::new(hooks)),
            connections,
            instances,
        }
    }

    /// Starts the engine, or joins the instance already running on the same
    /// endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::TargetInUse`] when another live instance owns
    /// the working directory, [`LifecycleError::Workspace`] when the
    /// directory cannot be prepared, or whatever `do_start` reports. On error
    /// nothing stays registered and the directory is removed.
    pub fn start_engine(&self) -> Result<StartOutcome, LifecycleError> {
        match self.connections.acquire(&self.identity.key) {
            Acquisition::Shared { ref_count } => {
                debug!(
                    target: MANAGER_TARGET,
                    engine = %self.identity.engine,
                    endpoint = %self.identity.key,
                    ref_count,
                    "joined running engine"
                );
                Ok(StartOutcome::Shared { ref_count })
            }
            Acquisition::Start(permit) => {
                let teardown = self.start_fresh()?;
                permit.commit(Box::new(move || teardown.run()));
                info!(
                    target: MANAGER_TARGET,
                    engine = %self.identity.engine,
                    endpoint = %self.identity.key,
                    path = %self.identity.target,
                    "engine started"
                );
                Ok(StartOutcome::Started)
            }
        }
    }

    /// Drops one reference, stopping the engine when it was the last.
    ///
    /// Never fails: stop errors are logged and the endpoint is deregistered
    /// regardless.
    #[must_use]
    pub fn stop_engine(&self) -> StopOutcome {
        match self.connections.release(&self.identity.key) {
            Release::Remaining { ref_count } => {
                debug!(
                    target: MANAGER_TARGET,
                    engine = %self.identity.engine,
                    endpoint = %self.identity.key,
                    remaining = ref_count,
                    "released shared engine"
                );
                StopOutcome::Released {
                    remaining: ref_count,
                }
            }
            Release::Drained(permit) => {
                permit.finish();
                StopOutcome::Stopped
            }
            Release::NotRegistered => {
                debug!(
                    target: MANAGER_TARGET,
                    engine = %self.identity.engine,
                    endpoint = %self.identity.key,
                    "stop requested for an engine that is not running"
                );
                StopOutcome::NotRunning
            }
        }
    }

    /// Starts the engine and returns a guard that stops it when dropped.
    ///
    /// # Errors
    ///
    /// Propagates any [`start_engine`](Self::start_engine) failure.
    pub fn scope(&self) -> Result<EngineScope<'_, H>, LifecycleError> {
        let outcome = self.start_engine()?;
        Ok(EngineScope::new(self, outcome))
    }

    /// Handle registered for this manager's working directory.
    ///
    /// Lookup is by target path, so a manager that joined an endpoint started
    /// by another manager with a different working directory sees `None`; the
    /// handle lives under the starter's directory.
    #[must_use]
    pub fn instance(&self) -> Option<Arc<H::Handle>> {
        self.instances.get(&self.identity.target)
    }

    /// Returns `true` while the endpoint holds at least one reference.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.connections.is_registered(&self.identity.key)
    }

    /// Current reference count for the endpoint.
    #[must_use]
    pub fn ref_count(&self) -> usize {
        self.connections.ref_count(&self.identity.key)
    }

    /// Engine identity.
    #[must_use]
    pub const fn identity(&self) -> &EngineIdentity {
        &self.identity
    }

    /// Host the engine listens on.
    #[must_use]
    pub fn host(&self) -> &str {
        self.identity.key.host()
    }

    /// Port the engine listens on.
    #[must_use]
    pub const fn port(&self) -> u16 {
        self.identity.key.port()
    }

    /// Endpoint key.
    #[must_use]
    pub const fn key(&self) -> &ConnectionKey {
        &self.identity.key
    }

    /// Working directory.
    #[must_use]
    pub const fn target_path(&self) -> &TargetPath {
        &self.identity.target
    }

    /// Registry of handles this manager publishes into.
    #[must_use]
    pub const fn instances(&self) -> &Arc<KeyedInstanceRegistry<H::Handle>> {
        &self.instances
    }

    fn start_fresh(&self) -> Result<EngineTeardown<H>, LifecycleError> {
        let target = &self.identity.target;
        let reservation = self.instances.reserve(target)?;
        reset_directory(target)?;

        let started = self.lock_hooks().do_start(&self.identity);
        let handle = started.inspect_err(|error| {
            warn!(
                target: MANAGER_TARGET,
                engine = %self.identity.engine,
                endpoint = %self.identity.key,
                %error,
                "engine failed to start"
            );
            cleanup_directory(target);
        })?;
        reservation.fill(&handle);

        Ok(EngineTeardown {
            identity: self.identity.clone(),
            hooks: Arc::clone(&self.hooks),
            handle,
            instances: Arc::clone(&self.instances),
        })
    }

    fn lock_hooks(&self) -> MutexGuard<'_, H> {
        self.hooks.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<H: EngineHooks> fmt::Debug for ResourceLifecycleManager<H> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("ResourceLifecycleManager")
            .field("identity", &self.identity)
            .finish_non_exhaustive()
    }
}
