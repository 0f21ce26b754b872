//! Fleet configuration
//!
//! Settings come from built-in defaults, then an optional TOML fleet file,
//! then `FLEETLOG_*` environment variables (a `.env` file is honoured).
//!
//! ```toml
//! database_path = "./data/monitor.db"
//! artifact_root = "./exchange_results"
//!
//! [[hosts]]
//! name = "ubuntu-server-1"
//! address = "192.168.1.10"
//! ```

use crate::error::{IngestError, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

// ============================================================================
// Configuration Constants
// ============================================================================

/// Default location of the ingestion database.
pub const DEFAULT_DATABASE_PATH: &str = "./data/monitor.db";

/// Default directory holding one artifact folder per host.
pub const DEFAULT_ARTIFACT_ROOT: &str = "./exchange_results";

/// Default time a writer waits on another process's lock.
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5000;

/// Per-host subdirectory that holds both artifacts.
pub const LOGS_DIR: &str = "logs";

pub const LEDGER_FILE: &str = "history.csv";

pub const SUMMARY_FILE: &str = "received_summary.txt";

/// Host names become directory names, so they are kept path-safe.
const HOST_NAME_PATTERN: &str = r"^[A-Za-z0-9][A-Za-z0-9._-]*$";

/// Ingestion configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    pub database_path: PathBuf,
    pub artifact_root: PathBuf,
    pub busy_timeout_ms: u64,
    pub hosts: Vec<HostConfig>,
}

/// One fleet member
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostConfig {
    pub name: String,
    #[serde(default)]
    pub address: String,
    /// Overrides `<artifact_root>/<name>/logs/history.csv`
    #[serde(default)]
    pub ledger_path: Option<PathBuf>,
    /// Overrides `<artifact_root>/<name>/logs/received_summary.txt`
    #[serde(default)]
    pub summary_path: Option<PathBuf>,
}

impl HostConfig {
    pub fn new(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
            ledger_path: None,
            summary_path: None,
        }
    }

    /// Default artifact directory for this host
    pub fn logs_dir(&self, artifact_root: &Path) -> PathBuf {
        artifact_root.join(&self.name).join(LOGS_DIR)
    }

    pub fn ledger_path(&self, artifact_root: &Path) -> PathBuf {
        self.ledger_path
            .clone()
            .unwrap_or_else(|| self.logs_dir(artifact_root).join(LEDGER_FILE))
    }

    pub fn summary_path(&self, artifact_root: &Path) -> PathBuf {
        self.summary_path
            .clone()
            .unwrap_or_else(|| self.logs_dir(artifact_root).join(SUMMARY_FILE))
    }

    /// True when neither artifact can be present.
    ///
    /// With the default layout that is a missing logs directory; with
    /// overridden paths both files must be absent.
    pub fn artifacts_missing(&self, artifact_root: &Path) -> bool {
        if self.ledger_path.is_none() && self.summary_path.is_none() {
            return !self.logs_dir(artifact_root).is_dir();
        }
        !self.ledger_path(artifact_root).exists() && !self.summary_path(artifact_root).exists()
    }
}

impl IngestConfig {
    /// Load configuration from defaults, an optional fleet file and the environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        dotenvy::dotenv().ok();

        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env();
        config.validate()?;

        Ok(config)
    }

    /// Parse a fleet file without applying environment overrides
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            IngestError::config(format!("Cannot read fleet file {}: {}", path.display(), e))
        })?;
        Ok(toml::from_str(&contents)?)
    }

    fn apply_env(&mut self) {
        if let Ok(path) = std::env::var("FLEETLOG_DATABASE") {
            self.database_path = PathBuf::from(path);
        }

        if let Ok(root) = std::env::var("FLEETLOG_ARTIFACT_ROOT") {
            self.artifact_root = PathBuf::from(root);
        }

        if let Some(ms) = std::env::var("FLEETLOG_BUSY_TIMEOUT_MS")
            .ok()
            .and_then(|s| s.parse().ok())
        {
            self.busy_timeout_ms = ms;
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.database_path.as_os_str().is_empty() {
            return Err(IngestError::config("Database path cannot be empty"));
        }

        let name_pattern =
            Regex::new(HOST_NAME_PATTERN).map_err(|e| IngestError::config(e.to_string()))?;
        let mut seen = HashSet::new();

        for host in &self.hosts {
            if host.name.is_empty() {
                return Err(IngestError::config("Host name cannot be empty"));
            }

            if !name_pattern.is_match(&host.name) {
                return Err(IngestError::config(format!(
                    "Host name '{}' may only contain letters, digits, '.', '_' and '-'",
                    host.name
                )));
            }

            if !seen.insert(host.name.as_str()) {
                return Err(IngestError::config(format!(
                    "Host '{}' is configured more than once",
                    host.name
                )));
            }

            if host.address.is_empty() {
                tracing::warn!(host = %host.name, "No address configured, host will be recorded as unknown");
            }
        }

        Ok(())
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }

    pub fn host(&self, name: &str) -> Option<&HostConfig> {
        self.hosts.iter().find(|h| h.name == name)
    }
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from(DEFAULT_DATABASE_PATH),
            artifact_root: PathBuf::from(DEFAULT_ARTIFACT_ROOT),
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            hosts: Vec::new(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;

    const FLEET: &str = r#"
database_path = "/var/lib/fleetlog/monitor.db"

[[hosts]]
name = "ubuntu-server-1"
address = "192.168.1.10"

[[hosts]]
name = "ubuntu-server-2"
address = "192.168.1.11"
ledger_path = "/srv/custom/history.csv"
"#;

    fn clear_env() {
        std::env::remove_var("FLEETLOG_DATABASE");
        std::env::remove_var("FLEETLOG_ARTIFACT_ROOT");
        std::env::remove_var("FLEETLOG_BUSY_TIMEOUT_MS");
    }

    fn fleet_file(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_defaults() {
        let config = IngestConfig::default();
        assert_eq!(config.database_path, PathBuf::from(DEFAULT_DATABASE_PATH));
        assert_eq!(config.artifact_root, PathBuf::from(DEFAULT_ARTIFACT_ROOT));
        assert_eq!(config.busy_timeout(), Duration::from_millis(5000));
        assert!(config.hosts.is_empty());
    }

    #[test]
    #[serial]
    fn test_load_fleet_file() {
        clear_env();
        let file = fleet_file(FLEET);

        let config = IngestConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.database_path, PathBuf::from("/var/lib/fleetlog/monitor.db"));
        assert_eq!(config.artifact_root, PathBuf::from(DEFAULT_ARTIFACT_ROOT));
        assert_eq!(config.hosts.len(), 2);
        assert_eq!(config.host("ubuntu-server-1").unwrap().address, "192.168.1.10");
    }

    #[test]
    #[serial]
    fn test_env_overrides_file() {
        clear_env();
        let file = fleet_file(FLEET);
        std::env::set_var("FLEETLOG_DATABASE", "/tmp/override.db");
        std::env::set_var("FLEETLOG_BUSY_TIMEOUT_MS", "250");

        let config = IngestConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.database_path, PathBuf::from("/tmp/override.db"));
        assert_eq!(config.busy_timeout_ms, 250);

        clear_env();
    }

    #[test]
    #[serial]
    fn test_unparseable_timeout_is_ignored() {
        clear_env();
        std::env::set_var("FLEETLOG_BUSY_TIMEOUT_MS", "soon");

        let config = IngestConfig::load(None).unwrap();
        assert_eq!(config.busy_timeout_ms, DEFAULT_BUSY_TIMEOUT_MS);

        clear_env();
    }

    #[test]
    fn test_default_artifact_paths() {
        let root = Path::new("/data/exchange_results");
        let host = HostConfig::new("ubuntu-server-1", "192.168.1.10");

        assert_eq!(
            host.ledger_path(root),
            PathBuf::from("/data/exchange_results/ubuntu-server-1/logs/history.csv")
        );
        assert_eq!(
            host.summary_path(root),
            PathBuf::from("/data/exchange_results/ubuntu-server-1/logs/received_summary.txt")
        );
    }

    #[test]
    fn test_overridden_ledger_path() {
        let config: IngestConfig = toml::from_str(FLEET).unwrap();
        let host = config.host("ubuntu-server-2").unwrap();

        assert_eq!(
            host.ledger_path(&config.artifact_root),
            PathBuf::from("/srv/custom/history.csv")
        );
        assert!(host
            .summary_path(&config.artifact_root)
            .ends_with("ubuntu-server-2/logs/received_summary.txt"));
    }

    #[test]
    fn test_example_fleet_file_is_valid() {
        let config: IngestConfig =
            toml::from_str(include_str!("../../../config/fleet.example.toml")).unwrap();
        config.validate().unwrap();
        assert_eq!(config.hosts.len(), 3);
        assert!(config.host("ubuntu-server-3").unwrap().summary_path.is_some());
    }

    #[test]
    fn test_validate_rejects_duplicates() {
        let config = IngestConfig {
            hosts: vec![HostConfig::new("a", "1"), HostConfig::new("a", "2")],
            ..IngestConfig::default()
        };
        assert!(matches!(config.validate(), Err(IngestError::Config(_))));
    }

    #[test]
    fn test_validate_rejects_unsafe_names() {
        for name in ["", "../etc", "host name"] {
            let config = IngestConfig {
                hosts: vec![HostConfig::new(name, "1")],
                ..IngestConfig::default()
            };
            assert!(config.validate().is_err(), "accepted {name:?}");
        }
    }

    #[test]
    fn test_invalid_toml() {
        let file = fleet_file("hosts = 3");
        assert!(matches!(
            IngestConfig::from_file(file.path()),
            Err(IngestError::ConfigParse(_))
        ));
    }

    #[test]
    fn test_artifacts_missing() {
        let dir = tempfile::tempdir().unwrap();
        let host = HostConfig::new("ubuntu-server-1", "");
        assert!(host.artifacts_missing(dir.path()));

        std::fs::create_dir_all(host.logs_dir(dir.path())).unwrap();
        assert!(!host.artifacts_missing(dir.path()));
    }
}
