//! Per-type registry of live engine handles keyed by working directory.
//!
//! Entries hold [`Weak`] references so the registry never extends a handle's
//! lifetime past the teardown that owns it. A directory is reserved before its
//! engine starts, so a second starter is turned away before it touches the
//! directory.

use std::any::{Any, TypeId, type_name};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use once_cell::sync::Lazy;
use tracing::debug;

use crate::error::LifecycleError;
use crate::key::TargetPath;

const INSTANCE_TARGET: &str = "nosqlkit_lifecycle::registry";

type AnyRegistry = Arc<dyn Any + Send + Sync>;

static GLOBALS: Lazy<Mutex<HashMap<TypeId, AnyRegistry>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

enum Slot<T> {
    Reserved,
    Live(Weak<T>),
}

impl<T> Slot<T> {
    fn is_occupied(&self) -> bool {
        match self {
            Self::Reserved => true,
            Self::Live(entry) => entry.strong_count() > 0,
        }
    }

    fn upgrade(&self) -> Option<Arc<T>> {
        match self {
            Self::Reserved => None,
            Self::Live(entry) => entry.upgrade(),
        }
    }
}

/// Map from working directory to the live handle started there.
pub struct KeyedInstanceRegistry<T> {
    entries: Mutex<BTreeMap<TargetPath, Slot<T>>>,
}

/// Claim on a working directory whose engine is still starting.
///
/// Dropping the reservation without [`fill`](Self::fill)ing it frees the
/// directory again.
#[must_use = "the directory is released as soon as the reservation drops"]
pub struct TargetReservation<'a, T>
where
    T: Send + Sync + 'static,
{
    registry: &'a KeyedInstanceRegistry<T>,
    target: Option<TargetPath>,
}

impl<T> TargetReservation<'_, T>
where
    T: Send + Sync + 'static,
{
    /// Publishes `instance` under the reserved directory.
    pub fn fill(mut self, instance: &Arc<T>) {
        if let Some(target) = self.target.take() {
            debug!(target: INSTANCE_TARGET, path = %target, kind = type_name::<T>(), "registered instance");
            self.registry
                .lock()
                .insert(target, Slot::Live(Arc::downgrade(instance)));
        }
    }
}

impl<T> Drop for TargetReservation<'_, T>
where
    T: Send + Sync + 'static,
{
    fn drop(&mut self) {
        if let Some(target) = self.target.take() {
            let mut entries = self.registry.lock();
            if matches!(entries.get(&target), Some(Slot::Reserved)) {
                entries.remove(&target);
                debug!(target: INSTANCE_TARGET, path = %target, "released reservation");
            }
        }
    }
}

impl<T> KeyedInstanceRegistry<T>
where
    T: Send + Sync + 'static,
{
    /// Creates an empty registry, independent of the global one.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: Mutex::new(BTreeMap::new()),
        }
    }

    /// Returns the process-wide registry for handles of type `T`.
    #[must_use]
    pub fn global() -> Arc<Self> {
        let mut globals = GLOBALS.lock().unwrap_or_else(PoisonError::into_inner);
        let slot = globals
            .entry(TypeId::of::<T>())
            .or_insert_with(|| Arc::new(Self::new()) as AnyRegistry);
        Arc::clone(slot).downcast::<Self>().unwrap_or_else(|_| {
            let fresh = Arc::new(Self::new());
            *slot = Arc::clone(&fresh) as AnyRegistry;
            fresh
        })
    }

    /// Claims `target` for an engine that is about to start.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::TargetInUse`] when the directory holds a live
    /// handle or another start has already reserved it.
    pub fn reserve(&self, target: &TargetPath) -> Result<TargetReservation<'_, T>, LifecycleError> {
        let mut entries = self.lock();
        if entries.get(target).is_some_and(Slot::is_occupied) {
            return Err(LifecycleError::TargetInUse {
                target: target.clone(),
            });
        }
        entries.insert(target.clone(), Slot::Reserved);
        Ok(TargetReservation {
            registry: self,
            target: Some(target.clone()),
        })
    }

    /// Records `instance` as the handle for `target`.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::TargetInUse`] when the directory holds a live
    /// handle or is reserved by a start in progress.
    pub fn insert(&self, target: TargetPath, instance: &Arc<T>) -> Result<(), LifecycleError> {
        let mut entries = self.lock();
        if entries.get(&target).is_some_and(Slot::is_occupied) {
            return Err(LifecycleError::TargetInUse { target });
        }
        debug!(target: INSTANCE_TARGET, path = %target, kind = type_name::<T>(), "registered instance");
        entries.insert(target, Slot::Live(Arc::downgrade(instance)));
        Ok(())
    }

    /// Forgets the handle for `target`.
    pub fn remove(&self, target: &TargetPath) {
        if self.lock().remove(target).is_some() {
            debug!(target: INSTANCE_TARGET, path = %target, kind = type_name::<T>(), "removed instance");
        }
    }

    /// Live handle for `target`, if any.
    #[must_use]
    pub fn get(&self, target: &TargetPath) -> Option<Arc<T>> {
        self.lock().get(target).and_then(Slot::upgrade)
    }

    /// Any live handle, choosing the lowest target path.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::NoInstanceRegistered`] when no live handle
    /// exists.
    pub fn get_any(&self) -> Result<Arc<T>, LifecycleError> {
        self.lock()
            .values()
            .find_map(Slot::upgrade)
            .ok_or(LifecycleError::NoInstanceRegistered {
                type_name: type_name::<T>(),
            })
    }

    /// Returns `true` when a live handle is registered for `target`.
    #[must_use]
    pub fn contains(&self, target: &TargetPath) -> bool {
        self.get(target).is_some()
    }

    /// Directories that currently have live handles, in sorted order.
    #[must_use]
    pub fn live_targets(&self) -> Vec<TargetPath> {
        self.lock()
            .iter()
            .filter(|(_, slot)| matches!(slot, Slot::Live(entry) if entry.strong_count() > 0))
            .map(|(target, _)| target.clone())
            .collect()
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<TargetPath, Slot<T>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T> Default for KeyedInstanceRegistry<T>
where
    T: Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for KeyedInstanceRegistry<T> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        formatter
            .debug_struct("KeyedInstanceRegistry")
            .field("kind", &type_name::<T>())
            .field("targets", &entries.keys().collect::<Vec<_>>())
            .finish()
    }
}
