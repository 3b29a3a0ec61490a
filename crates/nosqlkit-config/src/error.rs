use thiserror::Error;

use crate::engine::EngineKind;

/// Configuration problems detected before any process is spawned.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Neither an explicit engine path nor the home variable was provided.
    #[error(
        "no installation path configured for {engine}; set it on the builder or export {env_var}"
    )]
    MissingEnginePath {
        /// Engine being configured.
        engine: EngineKind,
        /// Environment variable consulted as a fallback.
        env_var: &'static str,
    },
    /// The working directory was empty.
    #[error("target path for {engine} must not be empty")]
    EmptyTargetPath {
        /// Engine being configured.
        engine: EngineKind,
    },
    /// The host name was empty.
    #[error("host for {engine} must not be empty")]
    EmptyHost {
        /// Engine being configured.
        engine: EngineKind,
    },
    /// Port zero asks the OS for an ephemeral port, which cannot be shared.
    #[error("port for {engine} must be non-zero")]
    InvalidPort {
        /// Engine being configured.
        engine: EngineKind,
    },
    /// A timeout option was set to zero.
    #[error("{option} for {engine} must be greater than zero")]
    ZeroDuration {
        /// Engine being configured.
        engine: EngineKind,
        /// Name of the offending option.
        option: &'static str,
    },
    /// Readiness settings were internally inconsistent.
    #[error("invalid readiness settings for {engine}: {message}")]
    InvalidReadiness {
        /// Engine being configured.
        engine: EngineKind,
        /// Description of the problem.
        message: String,
    },
    /// The log format override was not recognised.
    #[error("unknown log format '{value}': {source}")]
    InvalidLogFormat {
        /// Raw value supplied.
        value: String,
        /// Underlying parse error.
        #[source]
        source: strum::ParseError,
    },
}
