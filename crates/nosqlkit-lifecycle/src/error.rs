//! Error taxonomy for the lifecycle core.
//!
//! Configuration, launch and readiness failures are fatal to the calling test
//! scope and surface from `start_engine`. Teardown failures are logged by
//! `stop_engine` and never returned. I/O errors are wrapped in `Arc` so the
//! enums stay small and cloneable.

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use camino::Utf8PathBuf;
use nosqlkit_config::ConfigError;
use thiserror::Error;

use crate::key::TargetPath;

/// Failures while launching a server process.
#[derive(Debug, Error, Clone)]
pub enum LaunchError {
    /// The executable does not exist.
    #[error("executable not found: {program:?}")]
    ProgramNotFound {
        /// Program that was requested.
        program: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: Arc<io::Error>,
    },
    /// The OS refused to start the executable.
    #[error("failed to start {program:?}: {source}")]
    Spawn {
        /// Program that was requested.
        program: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: Arc<io::Error>,
    },
    /// Standard output could not be attached to a reader.
    #[error("failed to capture output of {program:?}: {message}")]
    CaptureOutput {
        /// Program that was started.
        program: PathBuf,
        /// What went wrong.
        message: String,
    },
    /// The background launcher did not report within the timeout.
    #[error("launch of {program:?} was not confirmed within {timeout_ms} ms")]
    Timeout {
        /// Program that was requested.
        program: PathBuf,
        /// Timeout that elapsed.
        timeout_ms: u64,
    },
    /// The background launcher went away without reporting.
    #[error("launcher thread for {program:?} exited without reporting")]
    SpawnerDisconnected {
        /// Program that was requested.
        program: PathBuf,
    },
    /// A helper thread could not be created.
    #[error("failed to start helper thread '{name}': {source}")]
    Thread {
        /// Name of the helper thread.
        name: String,
        /// Underlying I/O error.
        #[source]
        source: Arc<io::Error>,
    },
}

/// Failures while tearing a server down. Always logged, never fatal.
#[derive(Debug, Error, Clone)]
pub enum TeardownError {
    /// Delivering a signal failed.
    #[error("failed to signal pid {pid}: {source}")]
    Signal {
        /// Target process.
        pid: u32,
        /// Underlying OS error.
        #[source]
        source: Arc<io::Error>,
    },
    /// The process survived the termination request and the kill.
    #[error("pid {pid} still running after {waited_ms} ms")]
    StillRunning {
        /// Target process.
        pid: u32,
        /// Total time spent waiting.
        waited_ms: u64,
    },
}

/// Errors surfaced by the lifecycle manager and engine hooks.
#[derive(Debug, Error, Clone)]
pub enum LifecycleError {
    /// Invalid engine configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// `get_any` found nothing to hand out.
    #[error("no instance of type {type_name} is currently registered")]
    NoInstanceRegistered {
        /// Type of handle that was requested.
        type_name: &'static str,
    },
    /// Another live instance already owns the working directory.
    #[error("target path '{target}' is already bound to a running instance")]
    TargetInUse {
        /// Contested working directory.
        target: TargetPath,
    },
    /// The working directory could not be prepared.
    #[error("failed to prepare working directory '{path}': {source}")]
    Workspace {
        /// Directory being prepared.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: Arc<io::Error>,
    },
    /// The server process could not be launched.
    #[error("failed to launch {engine} for target '{target}' on port {port}: {source}")]
    Launch {
        /// Engine label.
        engine: String,
        /// Working directory.
        target: TargetPath,
        /// Configured port.
        port: u16,
        /// Launch failure.
        #[source]
        source: LaunchError,
    },
    /// The server launched but never became ready.
    #[error("{engine} did not become ready on {host}:{port}; last output: {diagnostic}")]
    NotReady {
        /// Engine label.
        engine: String,
        /// Probed host.
        host: String,
        /// Probed port.
        port: u16,
        /// Last captured console text, or a placeholder when none exists.
        diagnostic: String,
    },
    /// Engine-specific start or stop logic failed.
    #[error("{engine}: {message}")]
    Engine {
        /// Engine label.
        engine: String,
        /// Failure description.
        message: String,
    },
    /// Stopping the engine failed.
    #[error("failed to stop {engine}: {source}")]
    Teardown {
        /// Engine label.
        engine: String,
        /// Teardown failure.
        #[source]
        source: TeardownError,
    },
}

impl LifecycleError {
    /// Returns `true` for errors detected before any process was spawned.
    #[must_use]
    pub const fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::Config(_) | Self::NoInstanceRegistered { .. } | Self::TargetInUse { .. }
        )
    }
}
