//! Handle to a launched server process.

use std::fmt;
use std::io;
use std::process::{Child, ExitStatus};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use super::PROCESS_TARGET;
use super::output::CapturedOutput;
use crate::error::TeardownError;

const POLL_INTERVAL: Duration = Duration::from_millis(25);
const KILL_WAIT: Duration = Duration::from_secs(5);

/// A running (or exited) child process with its captured console output.
///
/// Dropping the handle kills the process if it is still alive.
pub struct ManagedProcess {
    pid: u32,
    label: String,
    child: Mutex<Child>,
    output: CapturedOutput,
}

impl ManagedProcess {
    pub(super) fn new(label: String, child: Child, output: CapturedOutput) -> Self {
        Self {
            pid: child.id(),
            label,
            child: Mutex::new(child),
            output,
        }
    }

    /// OS process identifier.
    #[must_use]
    pub const fn pid(&self) -> u32 {
        self.pid
    }

    /// Human-readable name used in logs.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Captured standard output.
    #[must_use]
    pub const fn output(&self) -> &CapturedOutput {
        &self.output
    }

    /// Exit status if the process has terminated.
    #[must_use]
    pub fn exit_status(&self) -> Option<ExitStatus> {
        self.lock().try_wait().ok().flatten()
    }

    /// Returns `true` while the process has not exited.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.exit_status().is_none()
    }

    /// Polls until the process exits or `timeout` elapses.
    #[must_use]
    pub fn wait_for_exit(&self, timeout: Duration) -> Option<ExitStatus> {
        let deadline = deadline_after(timeout);
        loop {
            if let Some(status) = self.exit_status() {
                return Some(status);
            }
            let remaining = time_left(deadline);
            if remaining.is_zero() {
                return None;
            }
            thread::sleep(remaining.min(POLL_INTERVAL));
        }
    }

    /// Stops the process: a termination request first, then a kill once
    /// `grace` has elapsed.
    ///
    /// # Errors
    ///
    /// Returns [`TeardownError`] when a signal cannot be delivered or the
    /// process is still alive after the kill.
    pub fn destroy(&self, grace: Duration) -> Result<(), TeardownError> {
        if let Some(status) = self.exit_status() {
            debug!(target: PROCESS_TARGET, label = %self.label, pid = self.pid, ?status, "process already exited");
            return Ok(());
        }
        let started = Instant::now();
        self.request_termination()?;
        if let Some(status) = self.wait_for_exit(grace) {
            debug!(target: PROCESS_TARGET, label = %self.label, pid = self.pid, ?status, "process terminated");
            return Ok(());
        }
        warn!(
            target: PROCESS_TARGET,
            label = %self.label,
            pid = self.pid,
            grace_ms = duration_ms(grace),
            "process ignored termination request, killing"
        );
        let killed = self.lock().kill();
        killed.or_else(|source| {
            self.exit_status()
                .map(|_| ())
                .ok_or_else(|| TeardownError::Signal {
                    pid: self.pid,
                    source: Arc::new(source),
                })
        })?;
        self.wait_for_exit(KILL_WAIT)
            .map(|status| {
                debug!(target: PROCESS_TARGET, label = %self.label, pid = self.pid, ?status, "process killed");
            })
            .ok_or_else(|| TeardownError::StillRunning {
                pid: self.pid,
                waited_ms: duration_ms(started.elapsed()),
            })
    }

    #[cfg(unix)]
    fn request_termination(&self) -> Result<(), TeardownError> {
        use nix::errno::Errno;
        use nix::sys::signal::{Signal, kill};
        use nix::unistd::Pid;

        let raw = i32::try_from(self.pid).map_err(|_| TeardownError::Signal {
            pid: self.pid,
            source: Arc::new(io::Error::new(
                io::ErrorKind::InvalidInput,
                "pid out of range",
            )),
        })?;
        match kill(Pid::from_raw(raw), Signal::SIGTERM) {
            Ok(()) | Err(Errno::ESRCH) => Ok(()),
            Err(errno) => Err(TeardownError::Signal {
                pid: self.pid,
                source: Arc::new(io::Error::from(errno)),
            }),
        }
    }

    #[cfg(not(unix))]
    fn request_termination(&self) -> Result<(), TeardownError> {
        self.lock().kill().map_err(|source| TeardownError::Signal {
            pid: self.pid,
            source: Arc::new(source),
        })
    }

    fn lock(&self) -> MutexGuard<'_, Child> {
        self.child.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for ManagedProcess {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("ManagedProcess")
            .field("pid", &self.pid)
            .field("label", &self.label)
            .field("output", &self.output)
            .finish_non_exhaustive()
    }
}

impl Drop for ManagedProcess {
    fn drop(&mut self) {
        let child = self.child.get_mut().unwrap_or_else(PoisonError::into_inner);
        if matches!(child.try_wait(), Ok(None)) {
            warn!(target: PROCESS_TARGET, label = %self.label, pid = self.pid, "killing process left running");
            drop(child.kill());
            drop(child.wait());
        }
    }
}

pub(crate) fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Instant `timeout` from now, or `None` when that lies beyond what
/// [`Instant`] can represent.
pub(crate) fn deadline_after(timeout: Duration) -> Option<Instant> {
    Instant::now().checked_add(timeout)
}

/// Time until `deadline`; unbounded when there is none.
pub(crate) fn time_left(deadline: Option<Instant>) -> Duration {
    deadline.map_or(Duration::MAX, |at| {
        at.saturating_duration_since(Instant::now())
    })
}
