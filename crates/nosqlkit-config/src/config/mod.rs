//! Builder-style engine configuration.

use std::env;
use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};

use crate::defaults::{
    DEFAULT_HOST, DEFAULT_LAUNCH_TIMEOUT, DEFAULT_SHUTDOWN_GRACE, default_target_path,
};
use crate::engine::EngineKind;
use crate::error::ConfigError;
use crate::readiness::ReadinessSettings;

/// Validated description of one managed engine instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    kind: EngineKind,
    engine_path: Utf8PathBuf,
    target_path: Utf8PathBuf,
    host: String,
    port: u16,
    extra_args: Vec<String>,
    launch_timeout: Duration,
    shutdown_grace: Duration,
    readiness: ReadinessSettings,
}

impl EngineConfig {
    /// Starts a builder pre-populated with the defaults for `kind`.
    #[must_use]
    pub fn builder(kind: EngineKind) -> EngineConfigBuilder {
        EngineConfigBuilder::new(kind)
    }

    /// Engine this configuration describes.
    #[must_use]
    pub const fn kind(&self) -> EngineKind {
        self.kind
    }

    /// Installation directory of the engine.
    #[must_use]
    pub fn engine_path(&self) -> &Utf8Path {
        &self.engine_path
    }

    /// Working directory, wiped on every start.
    #[must_use]
    pub fn target_path(&self) -> &Utf8Path {
        &self.target_path
    }

    /// Host the server binds to.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Port the server listens on.
    #[must_use]
    pub const fn port(&self) -> u16 {
        self.port
    }

    /// Additional command-line arguments appended after the preset ones.
    #[must_use]
    pub fn extra_args(&self) -> &[String] {
        &self.extra_args
    }

    /// Upper bound on the wait for the launch step.
    #[must_use]
    pub const fn launch_timeout(&self) -> Duration {
        self.launch_timeout
    }

    /// Time allowed between SIGTERM and SIGKILL.
    #[must_use]
    pub const fn shutdown_grace(&self) -> Duration {
        self.shutdown_grace
    }

    /// Readiness detection settings.
    #[must_use]
    pub const fn readiness(&self) -> &ReadinessSettings {
        &self.readiness
    }
}

/// Collects named options for an [`EngineConfig`].
///
/// Every option has a default except the engine path, which is read from the
/// engine's home environment variable when not set explicitly.
#[derive(Debug, Clone)]
pub struct EngineConfigBuilder {
    kind: EngineKind,
    engine_path: Option<Utf8PathBuf>,
    target_path: Utf8PathBuf,
    host: String,
    port: u16,
    extra_args: Vec<String>,
    launch_timeout: Duration,
    shutdown_grace: Duration,
    readiness: ReadinessSettings,
}

impl EngineConfigBuilder {
    fn new(kind: EngineKind) -> Self {
        Self {
            kind,
            engine_path: None,
            target_path: default_target_path(kind),
            host: DEFAULT_HOST.to_owned(),
            port: kind.default_port(),
            extra_args: Vec::new(),
            launch_timeout: DEFAULT_LAUNCH_TIMEOUT,
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
            readiness: ReadinessSettings::for_engine(kind),
        }
    }

    /// Sets the engine installation directory.
    #[must_use]
    pub fn engine_path(mut self, path: impl Into<Utf8PathBuf>) -> Self {
        self.engine_path = Some(path.into());
        self
    }

    /// Sets the working directory.
    #[must_use]
    pub fn target_path(mut self, path: impl Into<Utf8PathBuf>) -> Self {
        self.target_path = path.into();
        self
    }

    /// Sets the bind host.
    #[must_use]
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Sets the listening port.
    #[must_use]
    pub const fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Appends one extra command-line argument.
    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.extra_args.push(arg.into());
        self
    }

    /// Appends several extra command-line arguments.
    #[must_use]
    pub fn extra_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extra_args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Sets the launch confirmation timeout.
    #[must_use]
    pub const fn launch_timeout(mut self, timeout: Duration) -> Self {
        self.launch_timeout = timeout;
        self
    }

    /// Sets the grace period between SIGTERM and SIGKILL.
    #[must_use]
    pub const fn shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    /// Replaces the engine's default readiness detection.
    #[must_use]
    pub fn readiness(mut self, readiness: ReadinessSettings) -> Self {
        self.readiness = readiness;
        self
    }

    /// Validates the options, consulting the process environment for the
    /// engine path fallback.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] describing the first invalid option.
    pub fn build(self) -> Result<EngineConfig, ConfigError> {
        self.build_with_env(|key| env::var(key).ok())
    }

    /// Validates the options, resolving the engine path fallback through
    /// `lookup` instead of the process environment.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] describing the first invalid option.
    pub fn build_with_env<F>(self, lookup: F) -> Result<EngineConfig, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let engine = self.kind;
        let engine_path = self
            .engine_path
            .or_else(|| {
                lookup(engine.home_env_var())
                    .filter(|value| !value.trim().is_empty())
                    .map(Utf8PathBuf::from)
            })
            .ok_or(ConfigError::MissingEnginePath {
                engine,
                env_var: engine.home_env_var(),
            })?;
        if self.target_path.as_str().trim().is_empty() {
            return Err(ConfigError::EmptyTargetPath { engine });
        }
        if self.host.trim().is_empty() {
            return Err(ConfigError::EmptyHost { engine });
        }
        if self.port == 0 {
            return Err(ConfigError::InvalidPort { engine });
        }
        if self.launch_timeout.is_zero() {
            return Err(ConfigError::ZeroDuration {
                engine,
                option: "launch timeout",
            });
        }
        self.readiness.validate(engine)?;
        Ok(EngineConfig {
            kind: engine,
            engine_path,
            target_path: self.target_path,
            host: self.host,
            port: self.port,
            extra_args: self.extra_args,
            launch_timeout: self.launch_timeout,
            shutdown_grace: self.shutdown_grace,
            readiness: self.readiness,
        })
    }
}

#[cfg(test)]
mod tests;
