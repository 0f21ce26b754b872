//! Read-side queries over the ingestion store
//!
//! Every collection can be narrowed by host and by an inclusive date range.
//! Dates are compared on the `YYYY-MM-DD` prefix of the stored timestamp.
//!
//! Byte sums use `TOTAL`, which cannot overflow, and are cast back to
//! INTEGER, which clamps at `i64::MAX`.

use crate::error::Result;
use crate::models::{
    Checkpoint, DailyActivity, ExchangeRecord, Host, ReceivedFileRecord, ACTION_SENT,
};
use crate::store::{checkpoint, hosts, metadata, quarantine};
use chrono::NaiveDate;
use rusqlite::{params, Connection, Row};
use serde::Serialize;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Host and date-range filter shared by all list queries
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordFilter {
    pub host: Option<String>,
    /// Inclusive lower bound
    pub from: Option<NaiveDate>,
    /// Inclusive upper bound
    pub to: Option<NaiveDate>,
}

impl RecordFilter {
    pub fn for_host(host: impl Into<String>) -> Self {
        Self {
            host: Some(host.into()),
            ..Self::default()
        }
    }

    pub fn between(mut self, from: Option<NaiveDate>, to: Option<NaiveDate>) -> Self {
        self.from = from;
        self.to = to;
        self
    }

    fn bounds(&self) -> (Option<String>, Option<String>) {
        (
            self.from.map(|d| d.format(DATE_FORMAT).to_string()),
            self.to.map(|d| d.format(DATE_FORMAT).to_string()),
        )
    }
}

/// Snapshot of ingestion progress
#[derive(Debug, Clone, Serialize)]
pub struct IngestStats {
    pub checkpoints: Vec<Checkpoint>,
    pub total_exchanges: i64,
    pub total_received_files: i64,
    pub rejected_entries: i64,
    pub last_incremental_update: Option<String>,
}

/// Outbound traffic from one host to one target list
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServerPair {
    pub source: String,
    /// `target_servers` exactly as logged, which may name several hosts
    pub target: String,
    pub files: i64,
    pub bytes: i64,
}

/// Ledger rows of one host within one clock hour
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HourlyActivity {
    /// `YYYY-MM-DD HH:00:00`
    pub hour: String,
    pub host: String,
    pub exchanges: i64,
}

/// Ledger rows grouped by file extension
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileTypeSummary {
    /// One of [`FILE_TYPES`], or `other`
    pub extension: String,
    pub files: i64,
    pub total_size: i64,
}

/// A host with its sent and received files, newest first
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HostDetails {
    #[serde(flatten)]
    pub host: Host,
    pub sent_files: Vec<ExchangeRecord>,
    pub received_files: Vec<ReceivedFileRecord>,
}

/// Extensions reported individually by [`file_types`]
pub const FILE_TYPES: [&str; 5] = ["txt", "csv", "log", "pdf", "json"];

fn exchange_row(row: &Row<'_>) -> rusqlite::Result<ExchangeRecord> {
    Ok(ExchangeRecord {
        host: row.get(0)?,
        timestamp: row.get(1)?,
        hostname: row.get(2)?,
        action: row.get(3)?,
        target_servers: row.get(4)?,
        filename: row.get(5)?,
        status: row.get(6)?,
        size_bytes: row.get(7)?,
    })
}

fn received_row(row: &Row<'_>) -> rusqlite::Result<ReceivedFileRecord> {
    Ok(ReceivedFileRecord {
        host: row.get(0)?,
        filename: row.get(1)?,
        source_host: row.get(2)?,
        received_date: row.get(3)?,
        size_raw: row.get(4)?,
        size_bytes: row.get(5)?,
    })
}

pub fn list_hosts(conn: &Connection, filter: &RecordFilter) -> Result<Vec<Host>> {
    let mut stmt = conn.prepare(
        r#"
        SELECT name, address, sent, received, last_exchange
        FROM hosts
        WHERE ?1 IS NULL OR name = ?1
        ORDER BY name
        "#,
    )?;

    let hosts = stmt
        .query_map(params![filter.host], |row| {
            Ok(Host {
                name: row.get(0)?,
                address: row.get(1)?,
                sent: row.get(2)?,
                received: row.get(3)?,
                last_exchange: row.get(4)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(hosts)
}

pub fn list_exchanges(conn: &Connection, filter: &RecordFilter) -> Result<Vec<ExchangeRecord>> {
    let (from, to) = filter.bounds();
    let mut stmt = conn.prepare(
        r#"
        SELECT host, timestamp, hostname, action, target_servers, filename, status, size_bytes
        FROM exchanges
        WHERE (?1 IS NULL OR host = ?1)
          AND (?2 IS NULL OR substr(timestamp, 1, 10) >= ?2)
          AND (?3 IS NULL OR substr(timestamp, 1, 10) <= ?3)
        ORDER BY timestamp, id
        "#,
    )?;

    let records = stmt
        .query_map(params![filter.host, from, to], exchange_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(records)
}

pub fn list_received(conn: &Connection, filter: &RecordFilter) -> Result<Vec<ReceivedFileRecord>> {
    let (from, to) = filter.bounds();
    let mut stmt = conn.prepare(
        r#"
        SELECT host, filename, source_host, received_date, size_raw, size_bytes
        FROM received_files
        WHERE (?1 IS NULL OR host = ?1)
          AND (?2 IS NULL OR substr(received_date, 1, 10) >= ?2)
          AND (?3 IS NULL OR substr(received_date, 1, 10) <= ?3)
        ORDER BY received_date, id
        "#,
    )?;

    let records = stmt
        .query_map(params![filter.host, from, to], received_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(records)
}

pub fn list_daily_activity(
    conn: &Connection,
    filter: &RecordFilter,
) -> Result<Vec<DailyActivity>> {
    let (from, to) = filter.bounds();
    let mut stmt = conn.prepare(
        r#"
        SELECT date, host, files_sent, files_received, bytes_sent, bytes_received
        FROM daily_activity
        WHERE (?1 IS NULL OR host = ?1)
          AND (?2 IS NULL OR date >= ?2)
          AND (?3 IS NULL OR date <= ?3)
        ORDER BY date, host
        "#,
    )?;

    let rows = stmt
        .query_map(params![filter.host, from, to], |row| {
            Ok(DailyActivity {
                date: row.get(0)?,
                host: row.get(1)?,
                files_sent: row.get(2)?,
                files_received: row.get(3)?,
                bytes_sent: row.get(4)?,
                bytes_received: row.get(5)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows)
}

/// The `limit` most recent ledger rows, newest first
pub fn recent_exchanges(
    conn: &Connection,
    filter: &RecordFilter,
    limit: u32,
) -> Result<Vec<ExchangeRecord>> {
    let (from, to) = filter.bounds();
    let mut stmt = conn.prepare(
        r#"
        SELECT host, timestamp, hostname, action, target_servers, filename, status, size_bytes
        FROM exchanges
        WHERE (?1 IS NULL OR host = ?1)
          AND (?2 IS NULL OR substr(timestamp, 1, 10) >= ?2)
          AND (?3 IS NULL OR substr(timestamp, 1, 10) <= ?3)
        ORDER BY timestamp DESC, id DESC
        LIMIT ?4
        "#,
    )?;

    let records = stmt
        .query_map(params![filter.host, from, to, i64::from(limit)], exchange_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(records)
}

/// Sent rows grouped by sender and target, busiest pair first
pub fn server_pairs(conn: &Connection, filter: &RecordFilter) -> Result<Vec<ServerPair>> {
    let (from, to) = filter.bounds();
    let mut stmt = conn.prepare(
        r#"
        SELECT host, target_servers, COUNT(*) AS files, CAST(TOTAL(size_bytes) AS INTEGER)
        FROM exchanges
        WHERE action = ?4
          AND target_servers <> ''
          AND (?1 IS NULL OR host = ?1)
          AND (?2 IS NULL OR substr(timestamp, 1, 10) >= ?2)
          AND (?3 IS NULL OR substr(timestamp, 1, 10) <= ?3)
        GROUP BY host, target_servers
        ORDER BY files DESC, host, target_servers
        "#,
    )?;

    let pairs = stmt
        .query_map(params![filter.host, from, to, ACTION_SENT], |row| {
            Ok(ServerPair {
                source: row.get(0)?,
                target: row.get(1)?,
                files: row.get(2)?,
                bytes: row.get(3)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(pairs)
}

/// Ledger rows per clock hour and host. Unparseable timestamps are left out.
pub fn hourly_activity(conn: &Connection, filter: &RecordFilter) -> Result<Vec<HourlyActivity>> {
    let (from, to) = filter.bounds();
    let mut stmt = conn.prepare(
        r#"
        SELECT strftime('%Y-%m-%d %H:00:00', timestamp) AS hour, host, COUNT(*)
        FROM exchanges
        WHERE strftime('%Y-%m-%d %H:00:00', timestamp) IS NOT NULL
          AND (?1 IS NULL OR host = ?1)
          AND (?2 IS NULL OR substr(timestamp, 1, 10) >= ?2)
          AND (?3 IS NULL OR substr(timestamp, 1, 10) <= ?3)
        GROUP BY hour, host
        ORDER BY hour, host
        "#,
    )?;

    let rows = stmt
        .query_map(params![filter.host, from, to], |row| {
            Ok(HourlyActivity {
                hour: row.get(0)?,
                host: row.get(1)?,
                exchanges: row.get(2)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows)
}

/// Ledger rows grouped by extension (case-insensitive), most files first
pub fn file_types(conn: &Connection, filter: &RecordFilter) -> Result<Vec<FileTypeSummary>> {
    let (from, to) = filter.bounds();
    let mut stmt = conn.prepare(
        r#"
        SELECT
            CASE
                WHEN filename LIKE '%.txt' THEN 'txt'
                WHEN filename LIKE '%.csv' THEN 'csv'
                WHEN filename LIKE '%.log' THEN 'log'
                WHEN filename LIKE '%.pdf' THEN 'pdf'
                WHEN filename LIKE '%.json' THEN 'json'
                ELSE 'other'
            END AS extension,
            COUNT(*) AS files,
            CAST(TOTAL(size_bytes) AS INTEGER)
        FROM exchanges
        WHERE filename <> ''
          AND (?1 IS NULL OR host = ?1)
          AND (?2 IS NULL OR substr(timestamp, 1, 10) >= ?2)
          AND (?3 IS NULL OR substr(timestamp, 1, 10) <= ?3)
        GROUP BY extension
        ORDER BY files DESC, extension
        "#,
    )?;

    let rows = stmt
        .query_map(params![filter.host, from, to], |row| {
            Ok(FileTypeSummary {
                extension: row.get(0)?,
                files: row.get(1)?,
                total_size: row.get(2)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows)
}

/// One host with everything it sent and received, or `None` if it was never ingested
pub fn host_details(conn: &Connection, name: &str) -> Result<Option<HostDetails>> {
    let Some(host) = hosts::get(conn, name)? else {
        return Ok(None);
    };

    let mut stmt = conn.prepare(
        r#"
        SELECT host, timestamp, hostname, action, target_servers, filename, status, size_bytes
        FROM exchanges
        WHERE host = ?1 AND action = ?2
        ORDER BY timestamp DESC, id DESC
        "#,
    )?;
    let sent_files = stmt
        .query_map(params![name, ACTION_SENT], exchange_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let mut stmt = conn.prepare(
        r#"
        SELECT host, filename, source_host, received_date, size_raw, size_bytes
        FROM received_files
        WHERE host = ?1
        ORDER BY received_date DESC, id DESC
        "#,
    )?;
    let received_files = stmt
        .query_map(params![name], received_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(Some(HostDetails {
        host,
        sent_files,
        received_files,
    }))
}

pub fn stats(conn: &Connection) -> Result<IngestStats> {
    let total_exchanges = conn.query_row("SELECT COUNT(*) FROM exchanges", [], |row| row.get(0))?;
    let total_received_files =
        conn.query_row("SELECT COUNT(*) FROM received_files", [], |row| row.get(0))?;

    Ok(IngestStats {
        checkpoints: checkpoint::list(conn)?,
        total_exchanges,
        total_received_files,
        rejected_entries: quarantine::count(conn)?,
        last_incremental_update: metadata::get(conn, metadata::LAST_INCREMENTAL_UPDATE)?,
    })
}
