//! Reference-counted table of running endpoints.
//!
//! Each [`ConnectionKey`] moves through three states: `Starting` while the
//! first acquirer runs the engine's start hook, `Running` with a reference
//! count once the start committed, and `Stopping` while the last releaser runs
//! the teardown bound at commit time. Acquirers that find a key in a
//! transitional state wait on a condition variable instead of racing the
//! transition, so exactly one caller ever believes it is the first starter and
//! exactly one believes it is the last releaser.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fmt;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};

use once_cell::sync::Lazy;

use crate::key::ConnectionKey;

static GLOBAL: Lazy<Arc<ConnectionRegistry>> = Lazy::new(|| Arc::new(ConnectionRegistry::new()));

/// Work performed once the last reference to an endpoint is released.
pub trait ShutdownAction: Send {
    /// Consumes the action and runs it.
    fn shutdown(self: Box<Self>);
}

impl<F> ShutdownAction for F
where
    F: FnOnce() + Send,
{
    fn shutdown(self: Box<Self>) {
        (*self)();
    }
}

enum Slot {
    Starting,
    Running {
        ref_count: usize,
        shutdown: Option<Box<dyn ShutdownAction>>,
    },
    Stopping,
}

impl fmt::Debug for Slot {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Starting => formatter.write_str("Starting"),
            Self::Running { ref_count, .. } => formatter
                .debug_struct("Running")
                .field("ref_count", ref_count)
                .finish_non_exhaustive(),
            Self::Stopping => formatter.write_str("Stopping"),
        }
    }
}

/// Process-wide table of `ConnectionKey -> reference count`.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    slots: Mutex<HashMap<ConnectionKey, Slot>>,
    changed: Condvar,
}

/// Result of [`ConnectionRegistry::acquire`].
#[derive(Debug)]
pub enum Acquisition<'a> {
    /// The endpoint is already running; the count was incremented.
    Shared {
        /// Reference count after the increment.
        ref_count: usize,
    },
    /// The caller is the first acquirer and must start the engine.
    Start(StartPermit<'a>),
}

/// Result of [`ConnectionRegistry::release`].
#[derive(Debug)]
pub enum Release<'a> {
    /// Other holders remain; nothing to stop.
    Remaining {
        /// Reference count after the decrement.
        ref_count: usize,
    },
    /// The count reached zero; dropping the permit runs the teardown and
    /// removes the entry.
    Drained(StopPermit<'a>),
    /// The key was not running.
    NotRegistered,
}

impl ConnectionRegistry {
    /// Creates an empty registry, independent of the global one.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the process-wide registry.
    #[must_use]
    pub fn global() -> Arc<Self> {
        Arc::clone(&GLOBAL)
    }

    /// Registers interest in `key`.
    ///
    /// Increments the count of a running key, or marks an absent key as
    /// starting and hands the caller a [`StartPermit`]. Blocks while another
    /// caller is starting or stopping the same key. Calling this from inside
    /// the start or teardown of the same key deadlocks.
    #[must_use]
    pub fn acquire(&self, key: &ConnectionKey) -> Acquisition<'_> {
        let mut slots = self.lock();
        loop {
            match slots.entry(key.clone()) {
                Entry::Vacant(vacant) => {
                    vacant.insert(Slot::Starting);
                    return Acquisition::Start(StartPermit {
                        registry: self,
                        key: key.clone(),
                        committed: false,
                    });
                }
                Entry::Occupied(mut occupied) => {
                    if let Slot::Running { ref_count, .. } = occupied.get_mut() {
                        *ref_count += 1;
                        return Acquisition::Shared {
                            ref_count: *ref_count,
                        };
                    }
                }
            }
            slots = self
                .changed
                .wait(slots)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Drops one reference to `key`.
    #[must_use]
    pub fn release(&self, key: &ConnectionKey) -> Release<'_> {
        let mut slots = self.lock();
        let Some(slot) = slots.get_mut(key) else {
            return Release::NotRegistered;
        };
        match slot {
            Slot::Running { ref_count, .. } if *ref_count > 1 => {
                *ref_count -= 1;
                Release::Remaining {
                    ref_count: *ref_count,
                }
            }
            Slot::Running { shutdown, .. } => {
                let action = shutdown.take();
                *slot = Slot::Stopping;
                Release::Drained(StopPermit {
                    registry: self,
                    key: key.clone(),
                    shutdown: action,
                })
            }
            Slot::Starting | Slot::Stopping => Release::NotRegistered,
        }
    }

    /// Returns `true` when `key` is running with at least one reference.
    #[must_use]
    pub fn is_registered(&self, key: &ConnectionKey) -> bool {
        matches!(self.lock().get(key), Some(Slot::Running { .. }))
    }

    /// Current reference count for `key`; zero when not running.
    #[must_use]
    pub fn ref_count(&self, key: &ConnectionKey) -> usize {
        match self.lock().get(key) {
            Some(Slot::Running { ref_count, .. }) => *ref_count,
            Some(Slot::Starting | Slot::Stopping) | None => 0,
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<ConnectionKey, Slot>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn finish_start(&self, key: &ConnectionKey, shutdown: Box<dyn ShutdownAction>) {
        self.lock().insert(
            key.clone(),
            Slot::Running {
                ref_count: 1,
                shutdown: Some(shutdown),
            },
        );
        self.changed.notify_all();
    }

    fn remove(&self, key: &ConnectionKey) {
        self.lock().remove(key);
        self.changed.notify_all();
    }
}

/// Exclusive right to start the engine for a key.
///
/// Dropping the permit without [`commit`](Self::commit) removes the
/// `Starting` marker, leaving no entry behind.
pub struct StartPermit<'a> {
    registry: &'a ConnectionRegistry,
    key: ConnectionKey,
    committed: bool,
}

impl StartPermit<'_> {
    /// Key being started.
    #[must_use]
    pub const fn key(&self) -> &ConnectionKey {
        &self.key
    }

    /// Publishes the key as running with a count of one and binds the
    /// teardown that the last releaser will run.
    pub fn commit(mut self, shutdown: Box<dyn ShutdownAction>) {
        self.committed = true;
        self.registry.finish_start(&self.key, shutdown);
    }
}

impl fmt::Debug for StartPermit<'_> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("StartPermit")
            .field("key", &self.key)
            .field("committed", &self.committed)
            .finish()
    }
}

impl Drop for StartPermit<'_> {
    fn drop(&mut self) {
        if !self.committed {
            self.registry.remove(&self.key);
        }
    }
}

/// Exclusive right to tear down a drained key.
///
/// Dropping the permit runs the bound teardown and then removes the entry,
/// even when the teardown panics.
pub struct StopPermit<'a> {
    registry: &'a ConnectionRegistry,
    key: ConnectionKey,
    shutdown: Option<Box<dyn ShutdownAction>>,
}

impl StopPermit<'_> {
    /// Key being stopped.
    #[must_use]
    pub const fn key(&self) -> &ConnectionKey {
        &self.key
    }

    /// Runs the teardown and removes the entry.
    pub fn finish(self) {
        drop(self);
    }
}

impl fmt::Debug for StopPermit<'_> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("StopPermit")
            .field("key", &self.key)
            .field("has_shutdown", &self.shutdown.is_some())
            .finish()
    }
}

struct EntryRemoval<'a> {
    registry: &'a ConnectionRegistry,
    key: &'a ConnectionKey,
}

impl Drop for EntryRemoval<'_> {
    fn drop(&mut self) {
        self.registry.remove(self.key);
    }
}

impl Drop for StopPermit<'_> {
    fn drop(&mut self) {
        let _removal = EntryRemoval {
            registry: self.registry,
            key: &self.key,
        };
        if let Some(action) = self.shutdown.take() {
            action.shutdown();
        }
    }
}
