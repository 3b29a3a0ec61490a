//! Structured logging for test processes that manage engines.

use std::io::{self, IsTerminal};

use nosqlkit_config::{ConfigError, LogFormat, LoggingConfig};
use once_cell::sync::OnceCell;
use tracing::{Subscriber, subscriber::SetGlobalDefaultError};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;

static TELEMETRY_GUARD: OnceCell<()> = OnceCell::new();

/// Handle returned when telemetry has been initialised.
#[derive(Debug, Default, Clone, Copy)]
pub struct TelemetryHandle;

/// Errors encountered while configuring telemetry.
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    /// The logging environment variables could not be read.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// Failed to parse the configured log filter expression.
    #[error("invalid log filter: {0}")]
    Filter(String),
    /// Failed to install the tracing subscriber.
    #[error("failed to install telemetry subscriber: {0}")]
    Subscriber(SetGlobalDefaultError),
}

/// Installs the global tracing subscriber the first time it is called.
///
/// Later calls return a fresh [`TelemetryHandle`] without touching the
/// global state again.
///
/// # Errors
///
/// Returns [`TelemetryError::Filter`] for an unparsable filter expression and
/// [`TelemetryError::Subscriber`] when another subscriber is already
/// installed.
pub fn initialise(config: &LoggingConfig) -> Result<TelemetryHandle, TelemetryError> {
    TELEMETRY_GUARD
        .get_or_try_init(|| install_subscriber(config))
        .map(|()| TelemetryHandle)
}

/// Reads [`LoggingConfig::from_env`] and installs the subscriber.
///
/// # Errors
///
/// Returns [`TelemetryError::Config`] when the format variable is invalid,
/// otherwise behaves like [`initialise`].
pub fn initialise_from_env() -> Result<TelemetryHandle, TelemetryError> {
    let config = LoggingConfig::from_env()?;
    initialise(&config)
}

fn env_filter(config: &LoggingConfig) -> Result<EnvFilter, TelemetryError> {
    EnvFilter::try_new(config.filter()).map_err(|error| TelemetryError::Filter(error.to_string()))
}

fn install_subscriber(config: &LoggingConfig) -> Result<(), TelemetryError> {
    let filter = env_filter(config)?;

    let builder = |filter: EnvFilter| {
        fmt::Subscriber::builder()
            .with_env_filter(filter)
            .with_target(true)
            .with_level(true)
            .with_thread_ids(false)
            .with_thread_names(true)
            .with_writer(io::stderr)
            .with_ansi(io::stderr().is_terminal())
            .with_timer(fmt::time::UtcTime::rfc_3339())
    };

    let subscriber: Box<dyn Subscriber + Send + Sync> = match config.format() {
        LogFormat::Json => Box::new(builder(filter).json().flatten_event(true).finish()),
        LogFormat::Compact => Box::new(builder(filter).compact().finish()),
    };

    tracing::subscriber::set_global_default(subscriber).map_err(TelemetryError::Subscriber)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_filter_parses() {
        env_filter(&LoggingConfig::default()).expect("default filter is valid");
    }

    #[test]
    fn malformed_filter_is_rejected() {
        let config = LoggingConfig::new("nosqlkit=loudest", LogFormat::Compact);
        let error = env_filter(&config).expect_err("unknown level");
        assert!(matches!(error, TelemetryError::Filter(_)));
    }

    #[test]
    fn repeated_initialisation_is_idempotent() {
        let config = LoggingConfig::new("debug", LogFormat::Json);
        initialise(&config).expect("first install");
        initialise(&config).expect("second call reuses the subscriber");
    }
}
