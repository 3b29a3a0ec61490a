//! Server process launch, supervision and termination.
//!
//! [`ProcessLauncher`] starts a child with its stdout captured line by line,
//! [`AsyncSpawner`] bounds how long a launch may take, and [`ManagedProcess`]
//! owns the child until it is destroyed.

mod launcher;
mod managed;
mod output;
mod spawner;

pub use launcher::{Launch, LaunchSpec, ProcessLauncher};
pub use managed::ManagedProcess;
pub use output::{CapturedOutput, DEFAULT_CAPTURE_LIMIT};
pub use spawner::AsyncSpawner;

pub(crate) use managed::{deadline_after, time_left};

/// Tracing target for process operations.
pub(crate) const PROCESS_TARGET: &str = "nosqlkit_lifecycle::process";
