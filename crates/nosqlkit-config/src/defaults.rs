use std::time::Duration;

use camino::Utf8PathBuf;

use crate::engine::EngineKind;
use crate::logging::LogFormat;

/// Host every engine binds to unless configured otherwise.
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// How long the caller waits for the launch step to report back.
pub const DEFAULT_LAUNCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Grace period granted to a server between SIGTERM and SIGKILL.
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(1);

/// Number of connection attempts made by the probe readiness strategy.
pub const DEFAULT_PROBE_ATTEMPTS: u32 = 3;

/// Default log filter expression.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Build output folder that hosts per-engine working directories.
const BUILD_OUTPUT_DIR: &str = "target";

/// Default working directory for an engine: `target/<engine>-temp`.
#[must_use]
pub fn default_target_path(kind: EngineKind) -> Utf8PathBuf {
    Utf8PathBuf::from(BUILD_OUTPUT_DIR).join(format!("{}-temp", kind.slug()))
}

/// Default log filter expression.
#[must_use]
pub const fn default_log_filter() -> &'static str {
    DEFAULT_LOG_FILTER
}

/// Default logging format.
#[must_use]
pub const fn default_log_format() -> LogFormat {
    LogFormat::Compact
}
