use std::time::Duration;

use crate::defaults::DEFAULT_PROBE_ATTEMPTS;
use crate::engine::EngineKind;
use crate::error::ConfigError;

/// How a freshly launched server is recognised as ready.
///
/// Marker strings and line offsets depend on the engine version; they live
/// here as data so callers can override them without touching lifecycle code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadinessSettings {
    /// Connect to the server's port up to `attempts` times, sleeping
    /// `backoff` between failures.
    Probe {
        /// Maximum number of connection attempts.
        attempts: u32,
        /// Pause between consecutive attempts.
        backoff: Duration,
    },
    /// Scan captured standard output for `marker` at or after `min_line`.
    ConsoleMarker {
        /// Substring announcing readiness.
        marker: String,
        /// Zero-based index of the first line worth inspecting.
        min_line: usize,
        /// Upper bound on the scan.
        timeout: Duration,
    },
}

impl ReadinessSettings {
    /// Probe readiness with an explicit attempt count and backoff.
    #[must_use]
    pub const fn probe(attempts: u32, backoff: Duration) -> Self {
        Self::Probe { attempts, backoff }
    }

    /// Console-marker readiness.
    #[must_use]
    pub fn console_marker(marker: impl Into<String>, min_line: usize, timeout: Duration) -> Self {
        Self::ConsoleMarker {
            marker: marker.into(),
            min_line,
            timeout,
        }
    }

    /// Readiness detection used for `kind` unless overridden.
    #[must_use]
    pub fn for_engine(kind: EngineKind) -> Self {
        match kind {
            EngineKind::MongoDb => {
                Self::console_marker("Waiting for connections", 0, Duration::from_secs(30))
            }
            EngineKind::Neo4j => Self::console_marker("Started.", 0, Duration::from_secs(60)),
            EngineKind::DynamoDb => Self::console_marker(
                "Initializing DynamoDB Local",
                0,
                Duration::from_secs(30),
            ),
            EngineKind::Redis => Self::probe(DEFAULT_PROBE_ATTEMPTS, Duration::from_secs(1)),
            EngineKind::CouchDb | EngineKind::InfluxDb => {
                Self::probe(DEFAULT_PROBE_ATTEMPTS, Duration::from_secs(2))
            }
            EngineKind::Infinispan => Self::probe(DEFAULT_PROBE_ATTEMPTS, Duration::from_secs(3)),
            EngineKind::Elasticsearch | EngineKind::HBase => {
                Self::probe(DEFAULT_PROBE_ATTEMPTS, Duration::from_secs(5))
            }
        }
    }

    pub(crate) fn validate(&self, engine: EngineKind) -> Result<(), ConfigError> {
        match self {
            Self::Probe { attempts: 0, .. } => Err(ConfigError::InvalidReadiness {
                engine,
                message: String::from("probe attempts must be at least one"),
            }),
            Self::ConsoleMarker { marker, .. } if marker.is_empty() => {
                Err(ConfigError::InvalidReadiness {
                    engine,
                    message: String::from("console marker must not be empty"),
                })
            }
            Self::ConsoleMarker { timeout, .. } if timeout.is_zero() => {
                Err(ConfigError::ZeroDuration {
                    engine,
                    option: "readiness timeout",
                })
            }
            Self::Probe { .. } | Self::ConsoleMarker { .. } => Ok(()),
        }
    }
}
