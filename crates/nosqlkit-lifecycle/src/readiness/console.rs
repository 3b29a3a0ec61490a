//! Readiness by scanning a server's console output.

use std::thread;
use std::time::{Duration, Instant};

use tracing::debug;

use super::{READINESS_TARGET, ReadinessStrategy, ReadinessTarget};
use crate::process::{deadline_after, time_left};

const DEFAULT_POLL: Duration = Duration::from_millis(100);

/// Time allowed for output to drain after the process exits.
const EXIT_SETTLE: Duration = Duration::from_millis(500);

/// Waits for a marker substring to appear in captured stdout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsoleMarker {
    marker: String,
    min_line: usize,
    timeout: Duration,
    poll: Duration,
}

impl ConsoleMarker {
    /// Looks for `marker` in lines at or after the zero-based `min_line`.
    #[must_use]
    pub fn new(marker: impl Into<String>, min_line: usize, timeout: Duration) -> Self {
        Self {
            marker: marker.into(),
            min_line,
            timeout,
            poll: DEFAULT_POLL,
        }
    }

    /// Overrides how often the process state is rechecked while waiting.
    #[must_use]
    pub const fn with_poll(mut self, poll: Duration) -> Self {
        self.poll = poll;
        self
    }
}

impl ReadinessStrategy for ConsoleMarker {
    fn await_ready(&self, target: &ReadinessTarget<'_>) -> bool {
        let Some(process) = target.process else {
            debug!(
                target: READINESS_TARGET,
                engine = target.engine,
                "no process output to scan for the readiness marker"
            );
            return false;
        };
        let output = process.output();
        let deadline = deadline_after(self.timeout);
        let mut next = self.min_line;
        let mut exited_at = None;
        loop {
            let closed = output.is_closed();
            let fresh = output.lines_from(next);
            if let Some(offset) = fresh.iter().position(|line| line.contains(&self.marker)) {
                debug!(
                    target: READINESS_TARGET,
                    engine = target.engine,
                    line = next + offset,
                    marker = %self.marker,
                    "readiness marker found"
                );
                return true;
            }
            next += fresh.len();

            if exited_at.is_none() && !process.is_running() {
                exited_at = Some(Instant::now());
            }
            let settled = exited_at.is_some_and(|at: Instant| at.elapsed() >= EXIT_SETTLE);
            let remaining = time_left(deadline);
            let drained = closed && exited_at.is_some();
            if drained || settled || remaining.is_zero() {
                debug!(
                    target: READINESS_TARGET,
                    engine = target.engine,
                    exited = exited_at.is_some(),
                    marker = %self.marker,
                    "readiness marker not seen"
                );
                return false;
            }
            if closed {
                thread::sleep(remaining.min(self.poll));
            } else {
                let seen = output.line_count();
                let _count = output.wait_for_lines(seen, remaining.min(self.poll));
            }
        }
    }
}
