//! Connection probing with bounded retries.

use std::io;
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::thread;
use std::time::Duration;

use tracing::debug;

use super::{READINESS_TARGET, ReadinessStrategy, ReadinessTarget};
use crate::key::ConnectionKey;

/// Timeout applied to a single TCP connection attempt.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(2);

/// One connection attempt against an endpoint.
pub trait Probe: Send + Sync {
    /// Attempts a single connection.
    ///
    /// # Errors
    ///
    /// Returns the I/O error describing why the endpoint did not answer.
    fn probe(&self, key: &ConnectionKey) -> io::Result<()>;
}

/// Opens and immediately closes a TCP connection.
#[derive(Debug, Clone, Copy)]
pub struct TcpProbe {
    timeout: Duration,
}

impl TcpProbe {
    /// Probe with a per-attempt connect timeout.
    #[must_use]
    pub const fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for TcpProbe {
    fn default() -> Self {
        Self::new(DEFAULT_CONNECT_TIMEOUT)
    }
}

impl Probe for TcpProbe {
    fn probe(&self, key: &ConnectionKey) -> io::Result<()> {
        let address = resolve(key)?;
        TcpStream::connect_timeout(&address, self.timeout).map(drop)
    }
}

fn resolve(key: &ConnectionKey) -> io::Result<SocketAddr> {
    let mut addrs = (key.host(), key.port()).to_socket_addrs()?;
    addrs
        .next()
        .ok_or_else(|| io::Error::new(io::ErrorKind::AddrNotAvailable, "no resolved address"))
}

/// Retries a [`Probe`] a fixed number of times.
#[derive(Debug, Clone)]
pub struct ProbeWithBackoff<P> {
    probe: P,
    attempts: u32,
    backoff: Duration,
}

impl<P: Probe> ProbeWithBackoff<P> {
    /// Wraps `probe`, allowing `attempts` tries with `backoff` between them.
    #[must_use]
    pub const fn new(probe: P, attempts: u32, backoff: Duration) -> Self {
        Self {
            probe,
            attempts,
            backoff,
        }
    }
}

impl<P: Probe> ReadinessStrategy for ProbeWithBackoff<P> {
    fn await_ready(&self, target: &ReadinessTarget<'_>) -> bool {
        for attempt in 1..=self.attempts {
            match self.probe.probe(target.key) {
                Ok(()) => {
                    debug!(
                        target: READINESS_TARGET,
                        engine = target.engine,
                        endpoint = %target.key,
                        attempt,
                        "endpoint answered"
                    );
                    return true;
                }
                Err(error) => {
                    debug!(
                        target: READINESS_TARGET,
                        engine = target.engine,
                        endpoint = %target.key,
                        attempt,
                        attempts = self.attempts,
                        %error,
                        "endpoint not answering yet"
                    );
                }
            }
            if target.process.is_some_and(|process| !process.is_running()) {
                debug!(target: READINESS_TARGET, engine = target.engine, "process exited while probing");
                return false;
            }
            if attempt < self.attempts {
                thread::sleep(self.backoff);
            }
        }
        false
    }
}
