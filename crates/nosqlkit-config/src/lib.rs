//! Configuration shared by the nosqlkit lifecycle and engine crates.
//!
//! Test fixtures describe the server they need with an [`EngineConfig`],
//! assembled through [`EngineConfigBuilder`]. The builder carries a documented
//! default for every option except the engine installation path, which falls
//! back to the engine's home environment variable (for example `MONGO_HOME`).
//! Validation happens in [`EngineConfigBuilder::build`], before any process is
//! spawned, so a misconfigured fixture fails fast with a [`ConfigError`].
//!
//! Readiness detection is configuration data as well: [`ReadinessSettings`]
//! records whether an engine is probed over TCP or recognised by a console
//! marker, together with the engine-specific marker text and line offset.

mod config;
mod defaults;
mod engine;
mod error;
mod logging;
mod readiness;

pub use config::{EngineConfig, EngineConfigBuilder};
pub use defaults::{
    DEFAULT_HOST, DEFAULT_LAUNCH_TIMEOUT, DEFAULT_LOG_FILTER, DEFAULT_PROBE_ATTEMPTS,
    DEFAULT_SHUTDOWN_GRACE, default_log_filter, default_log_format, default_target_path,
};
pub use engine::{EngineKind, EngineKindParseError};
pub use error::ConfigError;
pub use logging::{LOG_FILTER_ENV, LOG_FORMAT_ENV, LogFormat, LogFormatParseError, LoggingConfig};
pub use readiness::ReadinessSettings;
