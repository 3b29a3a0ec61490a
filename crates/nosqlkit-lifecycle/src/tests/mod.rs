//! Crate-level test support and behaviour tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use camino::Utf8PathBuf;
use tempfile::TempDir;

use crate::error::LifecycleError;
use crate::key::{ConnectionKey, TargetPath};
use crate::manager::{EngineHooks, EngineIdentity, ResourceLifecycleManager};
use crate::registry::{ConnectionRegistry, KeyedInstanceRegistry};


/// Start and stop counts observed by [`RecordingHooks`].
#[derive(Debug, Default)]
pub(crate) struct Counters {
    starts: AtomicUsize,
    stops: AtomicUsize,
}

impl Counters {
    pub(crate) fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    pub(crate) fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }
}

/// Handle published by [`RecordingHooks`].
#[derive(Debug)]
pub(crate) struct FakeServer {
    pub(crate) identity: EngineIdentity,
}

/// Hooks that count calls and optionally fail.
#[derive(Debug, Default)]
pub(crate) struct RecordingHooks {
    counters: Arc<Counters>,
    fail_start: bool,
    fail_stop: bool,
    start_delay: Duration,
}

impl RecordingHooks {
    pub(crate) fn new(counters: &Arc<Counters>) -> Self {
        Self {
            counters: Arc::clone(counters),
            fail_start: false,
            fail_stop: false,
            start_delay: Duration::ZERO,
        }
    }

    /// Sleeps inside `do_start` after writing the pid file.
    pub(crate) const fn slow_start(mut self, delay: Duration) -> Self {
        self.start_delay = delay;
        self
    }

    pub(crate) const fn failing_start(mut self) -> Self {
        self.fail_start = true;
        self
    }

    pub(crate) const fn failing_stop(mut self) -> Self {
        self.fail_stop = true;
        self
    }
}

impl EngineHooks for RecordingHooks {
    type Handle = FakeServer;

    fn do_start(&mut self, identity: &EngineIdentity) -> Result<Arc<FakeServer>, LifecycleError> {
        self.counters.starts.fetch_add(1, Ordering::SeqCst);
        if self.fail_start {
            return Err(LifecycleError::Engine {
                engine: identity.engine().to_owned(),
                message: String::from("refused to start"),
            });
        }
        std::fs::write(
            identity.target().as_path().join("pid"),
            identity.key().port().to_string(),
        )
        .expect("working directory exists during start");
        thread::sleep(self.start_delay);
        Ok(Arc::new(FakeServer {
            identity: identity.clone(),
        }))
    }

    fn do_stop(&mut self) -> Result<(), LifecycleError> {
        self.counters.stops.fetch_add(1, Ordering::SeqCst);
        if self.fail_stop {
            return Err(LifecycleError::Engine {
                engine: String::from("fake"),
                message: String::from("refused to stop"),
            });
        }
        Ok(())
    }
}

/// Isolated registries plus a scratch directory for working directories.
pub(crate) struct Sandbox {
    root: TempDir,
    pub(crate) connections: Arc<ConnectionRegistry>,
    pub(crate) instances: Arc<KeyedInstanceRegistry<FakeServer>>,
}

impl Sandbox {
    pub(crate) fn new() -> Self {
        Self {
            root: TempDir::new().expect("temp dir"),
            connections: Arc::new(ConnectionRegistry::new()),
            instances: Arc::new(KeyedInstanceRegistry::new()),
        }
    }

    pub(crate) fn target(&self, name: &str) -> TargetPath {
        let root =
            Utf8PathBuf::from_path_buf(self.root.path().to_path_buf()).expect("utf-8 temp dir");
        TargetPath::new(root.join(name))
    }

    pub(crate) fn manager(
        &self,
        target: &str,
        port: u16,
        hooks: RecordingHooks,
    ) -> ResourceLifecycleManager<RecordingHooks> {
        let identity = EngineIdentity::new(
            "fake",
            ConnectionKey::new("localhost", port),
            self.target(target),
        );
        ResourceLifecycleManager::with_registries(
            identity,
            hooks,
            Arc::clone(&self.connections),
            Arc::clone(&self.instances),
        )
    }
}
