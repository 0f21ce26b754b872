//! Exchange ledger parser
//!
//! The ledger is a CSV file with a header row:
//!
//! ```text
//! timestamp,hostname,action,target_servers,file,status,size
//! 2025-05-14 01:00:00, ubuntu-server-1, sent, ubuntu-server-2, report.txt, success, 2 KB
//! ```
//!
//! Columns are located by header name, fields are trimmed, and short rows
//! read missing columns as empty.

use crate::error::Result;
use crate::models::{Artifact, Direction, ExchangeRecord};
use crate::parser::size_to_i64;
use crate::store::{daily, quarantine, records};
use csv::{ByteRecord, ReaderBuilder, StringRecord, Trim};
use rusqlite::Connection;
use serde::Serialize;
use std::path::Path;
use tracing::{debug, info, warn};

/// Outcome of one ledger pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LedgerPass {
    /// Rows that produced a new exchange record
    pub new_records: i64,
    /// 1-based number of the last data row read (0 if none)
    pub position: i64,
}

/// Column indexes resolved from the header row
#[derive(Debug, Default)]
struct LedgerColumns {
    timestamp: Option<usize>,
    hostname: Option<usize>,
    action: Option<usize>,
    target_servers: Option<usize>,
    file: Option<usize>,
    status: Option<usize>,
    size: Option<usize>,
}

impl LedgerColumns {
    fn from_headers(headers: &StringRecord) -> Self {
        let mut columns = Self::default();
        for (index, name) in headers.iter().enumerate() {
            let slot = match name.to_ascii_lowercase().as_str() {
                "timestamp" => &mut columns.timestamp,
                "hostname" => &mut columns.hostname,
                "action" => &mut columns.action,
                "target_servers" => &mut columns.target_servers,
                "file" => &mut columns.file,
                "status" => &mut columns.status,
                "size" => &mut columns.size,
                _ => continue,
            };
            slot.get_or_insert(index);
        }
        columns
    }

    fn field<'r>(row: &'r StringRecord, index: Option<usize>) -> &'r str {
        index.and_then(|i| row.get(i)).unwrap_or("")
    }

    fn record(&self, host: &str, row: &StringRecord) -> ExchangeRecord {
        ExchangeRecord {
            host: host.to_string(),
            timestamp: Self::field(row, self.timestamp).to_string(),
            hostname: Self::field(row, self.hostname).to_string(),
            action: Self::field(row, self.action).to_string(),
            target_servers: Self::field(row, self.target_servers).to_string(),
            filename: Self::field(row, self.file).to_string(),
            status: Self::field(row, self.status).to_string(),
            size_bytes: size_to_i64(Self::field(row, self.size)),
        }
    }
}

/// Reads one host's ledger into the store
pub struct LedgerParser<'a> {
    conn: &'a Connection,
    host: &'a str,
}

impl<'a> LedgerParser<'a> {
    pub fn new(conn: &'a Connection, host: &'a str) -> Self {
        Self { conn, host }
    }

    /// Ingest every data row after `last_line`.
    ///
    /// Rows at or before `last_line` are skipped without being interpreted.
    /// Malformed rows are quarantined and still count toward the position.
    pub fn ingest(&self, path: &Path, last_line: i64) -> Result<LedgerPass> {
        if !path.exists() {
            warn!(host = %self.host, path = %path.display(), "Ledger file not found");
            return Ok(LedgerPass::default());
        }

        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .trim(Trim::All)
            .flexible(true)
            .from_path(path)?;
        let columns = LedgerColumns::from_headers(reader.headers()?);

        let mut pass = LedgerPass::default();
        for result in reader.byte_records() {
            let raw = result?;
            pass.position += 1;

            if pass.position <= last_line {
                continue;
            }

            let row = match StringRecord::from_byte_record(raw) {
                Ok(row) => row,
                Err(err) => {
                    let reason = format!("invalid UTF-8: {}", err.utf8_error());
                    self.reject(pass.position, &lossy_line(&err.into_byte_record()), &reason)?;
                    continue;
                },
            };

            let record = columns.record(self.host, &row);
            if record.timestamp.is_empty() && record.filename.is_empty() {
                let line = row.iter().collect::<Vec<_>>().join(",");
                self.reject(pass.position, &line, "row has neither timestamp nor file")?;
                continue;
            }

            if !records::insert_exchange(self.conn, &record)? {
                continue;
            }

            pass.new_records += 1;
            debug!(
                host = %self.host,
                action = %record.action,
                target = %record.target_servers,
                file = %record.filename,
                "Recorded exchange"
            );

            if record.is_sent() {
                if let Some(date) = record.date() {
                    daily::bump(self.conn, date, self.host, Direction::Sent, record.size_bytes)?;
                }
            }
        }

        info!(
            host = %self.host,
            new_records = pass.new_records,
            position = pass.position,
            "Ledger pass complete"
        );
        Ok(pass)
    }

    fn reject(&self, position: i64, line: &str, reason: &str) -> Result<()> {
        warn!(host = %self.host, position, reason, "Skipping malformed ledger row");
        quarantine::record(self.conn, self.host, Artifact::Ledger, position, line, reason)
    }
}

fn lossy_line(record: &ByteRecord) -> String {
    record
        .iter()
        .map(String::from_utf8_lossy)
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::store::{queries, Store};
    use std::io::Write;

    const HEADER: &str = "timestamp,hostname,action,target_servers,file,status,size\n";

    fn ledger(contents: &[u8]) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_single_sent_row() {
        let store = Store::open_in_memory().unwrap();
        let file = ledger(
            format!(
                "{HEADER}2025-05-14 01:00:00, ubuntu-server-1, sent, ubuntu-server-2, report.txt, success, 2 KB\n"
            )
            .as_bytes(),
        );

        let parser = LedgerParser::new(store.connection(), "ubuntu-server-1");
        let pass = parser.ingest(file.path(), 0).unwrap();
        assert_eq!(pass, LedgerPass { new_records: 1, position: 1 });

        let records = queries::list_exchanges(store.connection(), &Default::default()).unwrap();
        assert_eq!(records[0].target_servers, "ubuntu-server-2");
        assert_eq!(records[0].size_bytes, 2048);

        let daily = queries::list_daily_activity(store.connection(), &Default::default()).unwrap();
        assert_eq!(daily.len(), 1);
        assert_eq!(daily[0].date, "2025-05-14");
        assert_eq!((daily[0].files_sent, daily[0].bytes_sent), (1, 2048));
    }

    #[test]
    fn test_rows_before_checkpoint_are_skipped() {
        let store = Store::open_in_memory().unwrap();
        let file = ledger(
            format!(
                "{HEADER}\
                 2025-05-14 01:00:00,h1,sent,h2,a.txt,success,1 KB\n\
                 2025-05-14 02:00:00,h1,sent,h2,b.txt,success,1 KB\n\
                 2025-05-14 03:00:00,h1,sent,h2,c.txt,success,1 KB\n"
            )
            .as_bytes(),
        );

        let parser = LedgerParser::new(store.connection(), "h1");
        let pass = parser.ingest(file.path(), 2).unwrap();
        assert_eq!(pass, LedgerPass { new_records: 1, position: 3 });

        let records = queries::list_exchanges(store.connection(), &Default::default()).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].filename, "c.txt");
    }

    #[test]
    fn test_reingest_counts_nothing_new() {
        let store = Store::open_in_memory().unwrap();
        let file = ledger(format!("{HEADER}2025-05-14 01:00:00,h1,sent,h2,a.txt,success,10\n").as_bytes());

        let parser = LedgerParser::new(store.connection(), "h1");
        parser.ingest(file.path(), 0).unwrap();
        let again = parser.ingest(file.path(), 0).unwrap();
        assert_eq!(again, LedgerPass { new_records: 0, position: 1 });

        let daily = queries::list_daily_activity(store.connection(), &Default::default()).unwrap();
        assert_eq!(daily[0].files_sent, 1);
    }

    #[test]
    fn test_non_sent_rows_do_not_touch_daily_activity() {
        let store = Store::open_in_memory().unwrap();
        let file = ledger(format!("{HEADER}2025-05-14 01:00:00,h1,failed,h2,a.txt,error,10\n").as_bytes());

        let pass = LedgerParser::new(store.connection(), "h1").ingest(file.path(), 0).unwrap();
        assert_eq!(pass.new_records, 1);
        assert!(queries::list_daily_activity(store.connection(), &Default::default())
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_malformed_rows_are_quarantined_and_counted() {
        let store = Store::open_in_memory().unwrap();
        let mut contents = HEADER.as_bytes().to_vec();
        contents.extend_from_slice(b"2025-05-14 01:00:00,h1,sent,h2,\xff\xfe.txt,success,10\n");
        contents.extend_from_slice(b",,sent,h2,,success,10\n");
        contents.extend_from_slice(b"2025-05-14 02:00:00,h1,sent,h2,ok.txt,success,10\n");
        let file = ledger(&contents);

        let pass = LedgerParser::new(store.connection(), "h1").ingest(file.path(), 0).unwrap();
        assert_eq!(pass, LedgerPass { new_records: 1, position: 3 });

        let rejected = quarantine::list(store.connection(), Some("h1")).unwrap();
        assert_eq!(rejected.len(), 2);
        assert_eq!(rejected[0].position, 1);
        assert!(rejected[0].reason.starts_with("invalid UTF-8"));
        assert_eq!(rejected[1].position, 2);
    }

    #[test]
    fn test_oversized_rows_keep_daily_activity_readable() {
        let store = Store::open_in_memory().unwrap();
        let file = ledger(
            format!(
                "{HEADER}\
                 2025-05-14 01:00:00,h1,sent,h2,a.txt,success,1e300\n\
                 2025-05-14 02:00:00,h1,sent,h2,b.txt,success,1e300\n"
            )
            .as_bytes(),
        );

        let pass = LedgerParser::new(store.connection(), "h1").ingest(file.path(), 0).unwrap();
        assert_eq!(pass.new_records, 2);

        let daily = queries::list_daily_activity(store.connection(), &Default::default()).unwrap();
        assert_eq!(daily.len(), 1);
        assert_eq!((daily[0].files_sent, daily[0].bytes_sent), (2, i64::MAX));
    }

    #[test]
    fn test_columns_found_by_header_name() {
        let store = Store::open_in_memory().unwrap();
        let file = ledger(
            b"file,action,timestamp,size\nx.txt,sent,2025-05-14 01:00:00,1 MB\n",
        );

        LedgerParser::new(store.connection(), "h1").ingest(file.path(), 0).unwrap();

        let records = queries::list_exchanges(store.connection(), &Default::default()).unwrap();
        assert_eq!(records[0].filename, "x.txt");
        assert_eq!(records[0].timestamp, "2025-05-14 01:00:00");
        assert_eq!(records[0].size_bytes, 1_048_576);
        assert_eq!(records[0].status, "");
    }

    #[test]
    fn test_missing_file_is_empty_pass() {
        let store = Store::open_in_memory().unwrap();
        let dir = tempfile::tempdir().unwrap();

        let pass = LedgerParser::new(store.connection(), "h1")
            .ingest(&dir.path().join("history.csv"), 5)
            .unwrap();
        assert_eq!(pass, LedgerPass::default());
    }
}
