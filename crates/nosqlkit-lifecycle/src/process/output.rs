//! Line buffer fed by a child's standard output.

use std::fmt;
use std::io::{BufRead, BufReader, Read};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use super::managed::{deadline_after, time_left};

/// Number of stdout lines retained per process unless overridden.
pub const DEFAULT_CAPTURE_LIMIT: usize = 10_000;

#[derive(Debug, Default)]
struct Buffer {
    lines: Vec<String>,
    dropped: usize,
    closed: bool,
}

#[derive(Debug, Default)]
struct Shared {
    buffer: Mutex<Buffer>,
    updated: Condvar,
}

/// Console output captured from a running server.
///
/// The first `limit` lines are retained. Later lines are read and counted so
/// the child never blocks on a full pipe, but their text is discarded.
#[derive(Clone)]
pub struct CapturedOutput {
    shared: Arc<Shared>,
    limit: usize,
}

impl CapturedOutput {
    /// Creates an empty buffer retaining at most `limit` lines.
    #[must_use]
    pub fn new(limit: usize) -> Self {
        Self {
            shared: Arc::new(Shared::default()),
            limit,
        }
    }

    /// Reads `source` line by line until end of stream, then marks the
    /// buffer closed. Invalid UTF-8 is replaced rather than rejected.
    pub fn consume<R: Read>(&self, source: R) {
        let mut reader = BufReader::new(source);
        let mut raw = Vec::new();
        loop {
            raw.clear();
            match reader.read_until(b'\n', &mut raw) {
                Ok(0) | Err(_) => break,
                Ok(_) => self.push(&String::from_utf8_lossy(&raw)),
            }
        }
        self.close();
    }

    /// Appends one line, stripping the trailing line terminator.
    pub fn push(&self, line: &str) {
        let mut buffer = self.lock();
        if buffer.lines.len() < self.limit {
            buffer
                .lines
                .push(line.trim_end_matches(|c| c == '\n' || c == '\r').to_owned());
        } else {
            buffer.dropped += 1;
        }
        drop(buffer);
        self.shared.updated.notify_all();
    }

    /// Marks the stream as finished and wakes any waiters.
    pub fn close(&self) {
        self.lock().closed = true;
        self.shared.updated.notify_all();
    }

    /// All retained lines.
    #[must_use]
    pub fn lines(&self) -> Vec<String> {
        self.lock().lines.clone()
    }

    /// Retained lines whose zero-based index is at least `start`.
    #[must_use]
    pub fn lines_from(&self, start: usize) -> Vec<String> {
        self.lock().lines.iter().skip(start).cloned().collect()
    }

    /// The last `count` retained lines.
    #[must_use]
    pub fn tail(&self, count: usize) -> Vec<String> {
        let buffer = self.lock();
        let skip = buffer.lines.len().saturating_sub(count);
        buffer.lines.iter().skip(skip).cloned().collect()
    }

    /// Total lines read so far, including discarded ones.
    #[must_use]
    pub fn line_count(&self) -> usize {
        let buffer = self.lock();
        buffer.lines.len() + buffer.dropped
    }

    /// Returns `true` once the stream reached end of file.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Blocks until more than `seen` lines were read, the stream closed, or
    /// `timeout` elapsed. Returns the line count observed on wake-up.
    #[must_use]
    pub fn wait_for_lines(&self, seen: usize, timeout: Duration) -> usize {
        let deadline = deadline_after(timeout);
        let mut buffer = self.lock();
        loop {
            let count = buffer.lines.len() + buffer.dropped;
            let remaining = time_left(deadline);
            if count > seen || buffer.closed || remaining.is_zero() {
                return count;
            }
            buffer = self
                .shared
                .updated
                .wait_timeout(buffer, remaining)
                .map_or_else(|poisoned| poisoned.into_inner().0, |(guard, _)| guard);
        }
    }

    fn lock(&self) -> MutexGuard<'_, Buffer> {
        self.shared
            .buffer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for CapturedOutput {
    fn default() -> Self {
        Self::new(DEFAULT_CAPTURE_LIMIT)
    }
}

impl fmt::Debug for CapturedOutput {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("CapturedOutput")
            .field("limit", &self.limit)
            .field("line_count", &self.line_count())
            .field("closed", &self.is_closed())
            .finish()
    }
}
