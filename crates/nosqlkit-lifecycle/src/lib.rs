//! Lifecycle core for NoSQL test fixtures.
//!
//! Tests that need a database server ask a [`ResourceLifecycleManager`] to
//! start it. Managers for the same `host:port` share one reference count held
//! in the process-wide [`ConnectionRegistry`]: the first start runs the
//! engine's [`EngineHooks::do_start`], nested starts only increment, and the
//! stop that drains the count runs [`EngineHooks::do_stop`] exactly once.
//! While an engine runs, its handle is published in a
//! [`KeyedInstanceRegistry`] keyed by working directory so that helpers can
//! find "the" running server without holding the manager.
//!
//! Engines backed by an external binary use the process layer:
//! [`AsyncSpawner`] launches a [`LaunchSpec`] with a bounded wait,
//! [`ManagedProcess`] captures console output and terminates the child, and a
//! [`ReadinessStrategy`] decides when the server accepts connections.
//!
//! ## Teardown
//!
//! Stopping never fails from the caller's point of view. Whatever `do_stop`
//! reports is logged, and the instance registration, working directory and
//! registry entry are always removed, in that order.

mod error;
mod key;
mod manager;
mod process;
mod readiness;
mod registry;
pub mod telemetry;
mod workspace;

pub use error::{LaunchError, LifecycleError, TeardownError};
pub use key::{ConnectionKey, TargetPath};
pub use manager::{
    EngineHooks, EngineIdentity, EngineScope, ResourceLifecycleManager, StartOutcome, StopOutcome,
};
pub use process::{
    AsyncSpawner, CapturedOutput, DEFAULT_CAPTURE_LIMIT, Launch, LaunchSpec, ManagedProcess,
    ProcessLauncher,
};
pub use readiness::{
    ConsoleMarker, DEFAULT_CONNECT_TIMEOUT, NO_OUTPUT, Probe, ProbeWithBackoff, ReadinessStrategy,
    ReadinessTarget, TcpProbe, ensure_ready, strategy_for,
};
pub use registry::{
    Acquisition, ConnectionRegistry, KeyedInstanceRegistry, Release, ShutdownAction, StartPermit,
    StopPermit, TargetReservation,
};
pub use telemetry::{TelemetryError, TelemetryHandle};
pub use workspace::{cleanup_directory, reset_directory};

#[cfg(test)]
mod tests;
