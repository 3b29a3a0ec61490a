//! Deciding when a launched server can accept connections.
//!
//! Two strategies exist: probing the endpoint with bounded retries, and
//! scanning captured console output for an engine-specific marker. Both
//! answer a plain yes or no; [`ensure_ready`] turns a "no" into an error that
//! carries the server's last output.

mod console;
mod probe;

use nosqlkit_config::ReadinessSettings;
use tracing::warn;

use crate::error::LifecycleError;
use crate::key::ConnectionKey;
use crate::process::ManagedProcess;

pub use console::ConsoleMarker;
pub use probe::{DEFAULT_CONNECT_TIMEOUT, Probe, ProbeWithBackoff, TcpProbe};

pub(crate) const READINESS_TARGET: &str = "nosqlkit_lifecycle::readiness";

/// Lines of console output attached to a readiness failure.
const DIAGNOSTIC_LINES: usize = 20;

/// Placeholder used when a failed server produced no output.
pub const NO_OUTPUT: &str = "<no output captured>";

/// What a strategy checks.
#[derive(Debug, Clone, Copy)]
pub struct ReadinessTarget<'a> {
    /// Engine label for logs.
    pub engine: &'a str,
    /// Endpoint that should come up.
    pub key: &'a ConnectionKey,
    /// The launched process, when the engine runs one.
    pub process: Option<&'a ManagedProcess>,
}

/// Decides whether a server is ready.
pub trait ReadinessStrategy: Send + Sync {
    /// Blocks until the server is ready or the strategy gives up.
    fn await_ready(&self, target: &ReadinessTarget<'_>) -> bool;
}

/// Builds the strategy described by `settings`.
#[must_use]
pub fn strategy_for(settings: &ReadinessSettings) -> Box<dyn ReadinessStrategy> {
    match settings {
        ReadinessSettings::Probe { attempts, backoff } => Box::new(ProbeWithBackoff::new(
            TcpProbe::default(),
            *attempts,
            *backoff,
        )),
        ReadinessSettings::ConsoleMarker {
            marker,
            min_line,
            timeout,
        } => Box::new(ConsoleMarker::new(marker.clone(), *min_line, *timeout)),
    }
}

/// Runs `strategy` and converts a negative answer into
/// [`LifecycleError::NotReady`].
///
/// # Errors
///
/// Returns [`LifecycleError::NotReady`] carrying the last captured console
/// lines when the server never became ready.
pub fn ensure_ready(
    strategy: &dyn ReadinessStrategy,
    target: &ReadinessTarget<'_>,
) -> Result<(), LifecycleError> {
    if strategy.await_ready(target) {
        return Ok(());
    }
    let diagnostic = last_output(target.process);
    warn!(
        target: READINESS_TARGET,
        engine = target.engine,
        endpoint = %target.key,
        diagnostic = %diagnostic,
        "server did not become ready"
    );
    Err(LifecycleError::NotReady {
        engine: target.engine.to_owned(),
        host: target.key.host().to_owned(),
        port: target.key.port(),
        diagnostic,
    })
}

fn last_output(process: Option<&ManagedProcess>) -> String {
    process
        .map(|running| running.output().tail(DIAGNOSTIC_LINES))
        .filter(|lines| !lines.is_empty())
        .map_or_else(|| NO_OUTPUT.to_owned(), |lines| lines.join("\n"))
}

#[cfg(test)]
mod tests;
