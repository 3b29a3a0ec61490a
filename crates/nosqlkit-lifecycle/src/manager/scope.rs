//! Guard that keeps an engine reference for the length of a test scope.

use std::sync::Arc;

use tracing::debug;

use super::{EngineHooks, MANAGER_TARGET, ResourceLifecycleManager, StartOutcome, StopOutcome};

/// Holds one reference to a running engine and releases it on drop.
#[must_use = "dropping the scope immediately releases the engine"]
pub struct EngineScope<'a, H: EngineHooks> {
    manager: &'a ResourceLifecycleManager<H>,
    outcome: StartOutcome,
    released: bool,
}

impl<'a, H: EngineHooks> EngineScope<'a, H> {
    pub(super) const fn new(manager: &'a ResourceLifecycleManager<H>, outcome: StartOutcome) -> Self {
        Self {
            manager,
            outcome,
            released: false,
        }
    }

    /// Whether entering this scope started the engine or joined it.
    #[must_use]
    pub const fn outcome(&self) -> StartOutcome {
        self.outcome
    }

    /// Manager that owns the engine.
    #[must_use]
    pub const fn manager(&self) -> &'a ResourceLifecycleManager<H> {
        self.manager
    }

    /// Handle of the running engine.
    #[must_use]
    pub fn instance(&self) -> Option<Arc<H::Handle>> {
        self.manager.instance()
    }

    /// Releases the reference now and reports what happened.
    #[must_use]
    pub fn release(mut self) -> StopOutcome {
        self.released = true;
        self.manager.stop_engine()
    }
}

impl<H: EngineHooks> Drop for EngineScope<'_, H> {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        let outcome = self.manager.stop_engine();
        debug!(
            target: MANAGER_TARGET,
            engine = %self.manager.identity().engine(),
            ?outcome,
            "engine scope closed"
        );
    }
}
