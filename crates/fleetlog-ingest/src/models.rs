//! Persisted record types
//!
//! Counts and byte totals are `i64` because that is what SQLite stores.

use serde::{Deserialize, Serialize};

/// Action value that marks an outbound exchange in the ledger
pub const ACTION_SENT: &str = "sent";

/// Source host recorded when a received filename carries no origin
pub const UNKNOWN_SOURCE: &str = "unknown";

/// A fleet member and its lifetime totals
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Host {
    pub name: String,
    pub address: String,
    pub sent: i64,
    pub received: i64,
    /// Latest ledger timestamp seen for this host
    pub last_exchange: Option<String>,
}

/// How far each artifact of a host has been consumed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub host: String,
    /// Ledger rows (excluding the header) already consumed
    pub last_ledger_line: i64,
    /// Received-file entries already consumed
    pub last_summary_count: i64,
    pub last_processed_at: Option<String>,
    /// Records inserted across all cycles
    pub total_exchanges: i64,
    pub total_received: i64,
}

impl Checkpoint {
    /// Checkpoint for a host that has never been ingested
    pub fn empty(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            last_ledger_line: 0,
            last_summary_count: 0,
            last_processed_at: None,
            total_exchanges: 0,
            total_received: 0,
        }
    }
}

/// One ledger row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangeRecord {
    pub host: String,
    pub timestamp: String,
    /// Hostname column as written by the remote host itself
    pub hostname: String,
    pub action: String,
    pub target_servers: String,
    pub filename: String,
    pub status: String,
    pub size_bytes: i64,
}

impl ExchangeRecord {
    pub fn is_sent(&self) -> bool {
        self.action == ACTION_SENT
    }

    /// Calendar date of the exchange (`YYYY-MM-DD` part of the timestamp)
    pub fn date(&self) -> Option<&str> {
        date_part(&self.timestamp)
    }
}

/// One entry of the received-file summary
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceivedFileRecord {
    pub host: String,
    pub filename: String,
    pub source_host: String,
    pub received_date: String,
    /// Size as written in the report, e.g. `"931 bytes"`
    pub size_raw: String,
    pub size_bytes: i64,
}

impl ReceivedFileRecord {
    pub fn date(&self) -> Option<&str> {
        date_part(&self.received_date)
    }
}

/// Per-day, per-host aggregate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyActivity {
    pub date: String,
    pub host: String,
    pub files_sent: i64,
    pub files_received: i64,
    pub bytes_sent: i64,
    pub bytes_received: i64,
}

/// Which counter pair of [`DailyActivity`] an event feeds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Sent,
    Received,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Sent => "sent",
            Direction::Received => "received",
        }
    }
}

/// Input artifact kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Artifact {
    Ledger,
    Summary,
}

impl Artifact {
    pub fn as_str(self) -> &'static str {
        match self {
            Artifact::Ledger => "ledger",
            Artifact::Summary => "summary",
        }
    }
}

impl std::fmt::Display for Artifact {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stored artifact name that is neither `ledger` nor `summary`
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown artifact '{0}'")]
pub struct UnknownArtifact(pub String);

impl std::str::FromStr for Artifact {
    type Err = UnknownArtifact;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "ledger" => Ok(Artifact::Ledger),
            "summary" => Ok(Artifact::Summary),
            other => Err(UnknownArtifact(other.to_string())),
        }
    }
}

/// Malformed input that was skipped during ingestion
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectedEntry {
    pub host: String,
    pub artifact: Artifact,
    /// Row or entry counter at which the input was found
    pub position: i64,
    pub line: String,
    pub reason: String,
    pub rejected_at: String,
}

/// Substring before the first space, if non-empty
fn date_part(stamp: &str) -> Option<&str> {
    stamp.split(' ').next().filter(|d| !d.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exchange(timestamp: &str, action: &str) -> ExchangeRecord {
        ExchangeRecord {
            host: "ubuntu-server-1".to_string(),
            timestamp: timestamp.to_string(),
            hostname: "ubuntu-server-1".to_string(),
            action: action.to_string(),
            target_servers: "ubuntu-server-2".to_string(),
            filename: "report.txt".to_string(),
            status: "success".to_string(),
            size_bytes: 2048,
        }
    }

    #[test]
    fn test_exchange_date() {
        assert_eq!(exchange("2025-05-14 01:00:00", "sent").date(), Some("2025-05-14"));
        assert_eq!(exchange("2025-05-14", "sent").date(), Some("2025-05-14"));
        assert_eq!(exchange("", "sent").date(), None);
    }

    #[test]
    fn test_is_sent() {
        assert!(exchange("2025-05-14 01:00:00", "sent").is_sent());
        assert!(!exchange("2025-05-14 01:00:00", "received").is_sent());
        assert!(!exchange("2025-05-14 01:00:00", "Sent").is_sent());
    }

    #[test]
    fn test_empty_checkpoint() {
        let checkpoint = Checkpoint::empty("ubuntu-server-3");
        assert_eq!(checkpoint.host, "ubuntu-server-3");
        assert_eq!(checkpoint.last_ledger_line, 0);
        assert_eq!(checkpoint.last_summary_count, 0);
        assert!(checkpoint.last_processed_at.is_none());
    }

    #[test]
    fn test_artifact_from_str() {
        for artifact in [Artifact::Ledger, Artifact::Summary] {
            assert_eq!(artifact.as_str().parse::<Artifact>(), Ok(artifact));
        }
        assert_eq!(
            "Ledger".parse::<Artifact>(),
            Err(UnknownArtifact("Ledger".to_string()))
        );
    }
}
