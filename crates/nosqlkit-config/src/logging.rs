use std::env;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::defaults::{default_log_filter, default_log_format};
use crate::error::ConfigError;

/// Environment variable overriding the log filter expression.
pub const LOG_FILTER_ENV: &str = "NOSQLKIT_LOG_FILTER";

/// Environment variable overriding the log format.
pub const LOG_FORMAT_ENV: &str = "NOSQLKIT_LOG_FORMAT";

/// Supported logging output formats.
#[derive(
    Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq, EnumString, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum LogFormat {
    /// Structured JSON suitable for ingestion by logging stacks.
    Json,
    /// Human-readable single line output.
    #[default]
    Compact,
}

/// Errors encountered while parsing a [`LogFormat`] from text.
pub type LogFormatParseError = strum::ParseError;

/// Filter and format used when installing the tracing subscriber.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    filter: String,
    format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter().to_owned(),
            format: default_log_format(),
        }
    }
}

impl LoggingConfig {
    /// Creates a logging configuration from explicit values.
    #[must_use]
    pub fn new(filter: impl Into<String>, format: LogFormat) -> Self {
        Self {
            filter: filter.into(),
            format,
        }
    }

    /// Reads overrides from [`LOG_FILTER_ENV`] and [`LOG_FORMAT_ENV`].
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidLogFormat`] when the format variable is
    /// set to an unknown value.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Resolves overrides through `lookup`, falling back to defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidLogFormat`] when the looked-up format is
    /// not recognised.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(filter) = lookup(LOG_FILTER_ENV).filter(|value| !value.trim().is_empty()) {
            config.filter = filter;
        }
        if let Some(format) = lookup(LOG_FORMAT_ENV) {
            config.format = format
                .parse()
                .map_err(|source| ConfigError::InvalidLogFormat {
                    value: format.clone(),
                    source,
                })?;
        }
        Ok(config)
    }

    /// Filter expression understood by `tracing_subscriber::EnvFilter`.
    #[must_use]
    pub fn filter(&self) -> &str {
        &self.filter
    }

    /// Output format.
    #[must_use]
    pub const fn format(&self) -> LogFormat {
        self.format
    }
}
