//! Teardown bound to a running endpoint when its start commits.

use std::sync::{Arc, Mutex, PoisonError};

use tracing::{info, warn};

use super::{EngineHooks, EngineIdentity, MANAGER_TARGET};
use crate::registry::KeyedInstanceRegistry;
use crate::workspace::cleanup_directory;

/// Everything needed to stop what one successful start created.
///
/// The teardown captures the hooks of the manager that started the engine,
/// so the original starter's `do_stop` runs even when another manager drops
/// the last reference.
pub(super) struct EngineTeardown<H: EngineHooks> {
    pub(super) identity: EngineIdentity,
    pub(super) hooks: Arc<Mutex<H>>,
    pub(super) handle: Arc<H::Handle>,
    pub(super) instances: Arc<KeyedInstanceRegistry<H::Handle>>,
}

impl<H: EngineHooks> EngineTeardown<H> {
    /// Stops the engine, forgets its handle and removes its directory.
    ///
    /// Failures are logged and swallowed so the registry entry is always
    /// released afterwards.
    pub(super) fn run(self) {
        let Self {
            identity,
            hooks,
            handle,
            instances,
        } = self;
        let stopped = hooks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .do_stop();
        if let Err(error) = stopped {
            warn!(
                target: MANAGER_TARGET,
                engine = %identity.engine,
                endpoint = %identity.key,
                %error,
                "engine stop failed; continuing teardown"
            );
        }
        instances.remove(&identity.target);
        drop(handle);
        cleanup_directory(&identity.target);
        info!(
            target: MANAGER_TARGET,
            engine = %identity.engine,
            endpoint = %identity.key,
            path = %identity.target,
            "engine stopped"
        );
    }
}
