//! Launches a process on a helper thread with a bounded wait.

use std::fmt;
use std::sync::Arc;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use tracing::{debug, warn};

use super::PROCESS_TARGET;
use super::launcher::{Launch, LaunchSpec, ProcessLauncher};
use super::managed::{ManagedProcess, duration_ms};
use crate::error::LaunchError;

/// Runs a [`Launch`] implementation on a background thread and waits at most
/// `launch_timeout` for it to report.
///
/// If the launch is confirmed after the caller gave up, the late process is
/// killed by the helper thread.
pub struct AsyncSpawner<L: Launch = ProcessLauncher> {
    launcher: Arc<L>,
    launch_timeout: Duration,
}

impl AsyncSpawner {
    /// Creates a spawner for real child processes with the given bound.
    #[must_use]
    pub fn new(launch_timeout: Duration) -> Self {
        Self::with_launcher(ProcessLauncher, launch_timeout)
    }
}

impl<L: Launch> AsyncSpawner<L> {
    /// Creates a spawner that delegates to `launcher`.
    #[must_use]
    pub fn with_launcher(launcher: L, launch_timeout: Duration) -> Self {
        Self {
            launcher: Arc::new(launcher),
            launch_timeout,
        }
    }

    /// Configured bound on the launch handshake.
    #[must_use]
    pub const fn launch_timeout(&self) -> Duration {
        self.launch_timeout
    }

    /// Launches `spec` and blocks until the launch succeeds, fails, or the
    /// timeout elapses.
    ///
    /// # Errors
    ///
    /// Returns the launcher's [`LaunchError`], or [`LaunchError::Timeout`]
    /// when no result arrives in time.
    pub fn spawn(&self, spec: LaunchSpec) -> Result<ManagedProcess, LaunchError> {
        let (sender, receiver) = mpsc::sync_channel(1);
        let launcher = Arc::clone(&self.launcher);
        let program = spec.program().to_path_buf();
        let thread_name = format!("{}-launcher", spec.display_label());

        thread::Builder::new()
            .name(thread_name.clone())
            .spawn(move || {
                let result = launcher.launch(&spec);
                if let Err(mpsc::SendError(Ok(process))) = sender.send(result) {
                    warn!(
                        target: PROCESS_TARGET,
                        label = %spec.display_label(),
                        pid = process.pid(),
                        "launch confirmed after the caller gave up, killing"
                    );
                    drop(process);
                }
            })
            .map(drop)
            .map_err(|err| LaunchError::Thread {
                name: thread_name,
                source: Arc::new(err),
            })?;

        match receiver.recv_timeout(self.launch_timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => {
                debug!(
                    target: PROCESS_TARGET,
                    program = %program.display(),
                    timeout_ms = duration_ms(self.launch_timeout),
                    "launch not confirmed in time"
                );
                Err(LaunchError::Timeout {
                    program,
                    timeout_ms: duration_ms(self.launch_timeout),
                })
            }
            Err(RecvTimeoutError::Disconnected) => {
                Err(LaunchError::SpawnerDisconnected { program })
            }
        }
    }
}

impl<L: Launch> Clone for AsyncSpawner<L> {
    fn clone(&self) -> Self {
        Self {
            launcher: Arc::clone(&self.launcher),
            launch_timeout: self.launch_timeout,
        }
    }
}

impl<L: Launch> fmt::Debug for AsyncSpawner<L> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("AsyncSpawner")
            .field("launch_timeout", &self.launch_timeout)
            .finish_non_exhaustive()
    }
}
