//! Identity types for running endpoints and their working directories.

use std::fmt;
use std::path::Path;

use camino::{Utf8Path, Utf8PathBuf};

/// `(host, port)` identity of a running server endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionKey {
    host: String,
    port: u16,
}

impl ConnectionKey {
    /// Builds a key for `host:port`.
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Host component.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Port component.
    #[must_use]
    pub const fn port(&self) -> u16 {
        self.port
    }
}

impl fmt::Display for ConnectionKey {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}:{}", self.host, self.port)
    }
}

/// Working directory that also names one logical engine instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TargetPath(Utf8PathBuf);

impl TargetPath {
    /// Wraps a UTF-8 path.
    #[must_use]
    pub fn new(path: impl Into<Utf8PathBuf>) -> Self {
        Self(path.into())
    }

    /// Borrows the path.
    #[must_use]
    pub fn as_path(&self) -> &Utf8Path {
        &self.0
    }

    /// Borrows the path as a standard library path.
    #[must_use]
    pub fn as_std_path(&self) -> &Path {
        self.0.as_std_path()
    }

    /// Borrows the path as text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for TargetPath {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.0.as_str())
    }
}

impl From<&str> for TargetPath {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<&Utf8Path> for TargetPath {
    fn from(value: &Utf8Path) -> Self {
        Self::new(value)
    }
}

impl From<Utf8PathBuf> for TargetPath {
    fn from(value: Utf8PathBuf) -> Self {
        Self(value)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn keys_compare_by_host_and_port() {
        let mut keys = HashSet::new();
        keys.insert(ConnectionKey::new("localhost", 9300));
        keys.insert(ConnectionKey::new("localhost", 9300));
        keys.insert(ConnectionKey::new("localhost", 9301));
        keys.insert(ConnectionKey::new("127.0.0.1", 9300));
        assert_eq!(keys.len(), 3);
    }

    #[test]
    fn key_displays_as_endpoint() {
        assert_eq!(ConnectionKey::new("db", 27017).to_string(), "db:27017");
    }

    #[test]
    fn target_path_round_trips_text() {
        let target = TargetPath::from("target/mongo-temp");
        assert_eq!(target.as_str(), "target/mongo-temp");
        assert_eq!(target.to_string(), "target/mongo-temp");
        assert_eq!(target.as_std_path(), Path::new("target/mongo-temp"));
    }
}
