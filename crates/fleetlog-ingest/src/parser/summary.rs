//! Received-files summary parser
//!
//! The summary is a plain-text report. Only the entries between a
//! `Files Received:` line and the following `Total Files:` line are read:
//!
//! ```text
//! Files Received:
//! - from_ubuntu-server-2_20250514_010156.txt (Size: 931 bytes, Date: 2025-05-14 01:01:57.15534749Z +0000 UTC)
//! Total Files: 1
//! ```
//!
//! The whole report is rewritten by its producer, so progress is tracked as
//! the number of entries already seen rather than a line number.

use crate::error::Result;
use crate::models::{Artifact, Direction, ReceivedFileRecord, UNKNOWN_SOURCE};
use crate::parser::size_to_i64;
use crate::store::{daily, quarantine, records};
use rusqlite::Connection;
use serde::Serialize;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info, warn};

const FILES_RECEIVED_MARKER: &str = "Files Received:";
const TOTAL_FILES_MARKER: &str = "Total Files:";
const ENTRY_PREFIX: &str = "- ";
const SIZE_MARKER: &str = " (Size: ";
const DATE_MARKER: &str = " bytes, Date: ";
const SOURCE_PREFIX: &str = "from_";

/// Outcome of one summary pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SummaryPass {
    /// Entries that produced a new received-file record
    pub new_records: i64,
    /// Number of entries seen in the report
    pub position: i64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
enum Section {
    #[default]
    Outside,
    InsideFiles,
}

/// What a report line means given the lines before it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind<'l> {
    SectionStart,
    /// Entry body with the leading `- ` removed
    Entry(&'l str),
    SectionEnd,
    Other,
}

/// Line-at-a-time state machine over the report sections
#[derive(Debug, Default)]
pub struct LineClassifier {
    section: Section,
}

impl LineClassifier {
    pub fn classify<'l>(&mut self, line: &'l str) -> LineKind<'l> {
        let line = line.trim();

        if line.contains(FILES_RECEIVED_MARKER) {
            self.section = Section::InsideFiles;
            return LineKind::SectionStart;
        }

        match self.section {
            Section::Outside => LineKind::Other,
            Section::InsideFiles => {
                if let Some(body) = line.strip_prefix(ENTRY_PREFIX) {
                    LineKind::Entry(body)
                } else if line.starts_with(TOTAL_FILES_MARKER) {
                    self.section = Section::Outside;
                    LineKind::SectionEnd
                } else {
                    LineKind::Other
                }
            },
        }
    }
}

/// Why an entry could not be read
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EntryError {
    #[error("missing \"(Size: \" marker")]
    MissingSize,

    #[error("missing \"bytes, Date: \" marker")]
    MissingDate,

    #[error("empty filename")]
    EmptyFilename,
}

/// Fields recovered from one entry body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedEntry {
    pub filename: String,
    pub source_host: String,
    /// `YYYY-MM-DD HH:MM:SS`, or empty when the report gave no date
    pub received_date: String,
    pub size_raw: String,
    pub size_bytes: i64,
}

impl ParsedEntry {
    fn into_record(self, host: &str) -> ReceivedFileRecord {
        ReceivedFileRecord {
            host: host.to_string(),
            filename: self.filename,
            source_host: self.source_host,
            received_date: self.received_date,
            size_raw: self.size_raw,
            size_bytes: self.size_bytes,
        }
    }
}

/// Parse `<filename> (Size: <n> bytes, Date: <date> <time>[.frac][ zone...])`
pub fn parse_entry(body: &str) -> std::result::Result<ParsedEntry, EntryError> {
    let (filename, rest) = body.split_once(SIZE_MARKER).ok_or(EntryError::MissingSize)?;
    let filename = filename.trim();
    if filename.is_empty() {
        return Err(EntryError::EmptyFilename);
    }

    let (size, date) = rest.split_once(DATE_MARKER).ok_or(EntryError::MissingDate)?;
    let size_raw = format!("{} bytes", size.trim());

    Ok(ParsedEntry {
        filename: filename.to_string(),
        source_host: source_host(filename),
        received_date: received_date(date),
        size_bytes: size_to_i64(&size_raw),
        size_raw,
    })
}

/// `from_<prefix>-<n>_...` names the sending host `<prefix>-<n>`
pub fn source_host(filename: &str) -> String {
    filename
        .strip_prefix(SOURCE_PREFIX)
        .and_then(|rest| rest.split_once('_'))
        .map(|(candidate, _)| candidate)
        .filter(|candidate| {
            candidate.rsplit_once('-').is_some_and(|(prefix, number)| {
                !prefix.is_empty()
                    && !number.is_empty()
                    && number.bytes().all(|b| b.is_ascii_digit())
            })
        })
        .unwrap_or(UNKNOWN_SOURCE)
        .to_string()
}

/// Keep the date and the whole-second time, dropping fraction and zone.
///
/// A value without a time part is not trusted and yields an empty date.
fn received_date(raw: &str) -> String {
    let raw = raw.trim().trim_end_matches(')').trim();
    let mut tokens = raw.split_whitespace();

    match (tokens.next(), tokens.next()) {
        (Some(date), Some(time)) => {
            let time = time.split('.').next().unwrap_or(time).trim_end_matches('Z');
            format!("{date} {time}")
        },
        _ => String::new(),
    }
}

/// Reads one host's summary report into the store
pub struct SummaryParser<'a> {
    conn: &'a Connection,
    host: &'a str,
}

impl<'a> SummaryParser<'a> {
    pub fn new(conn: &'a Connection, host: &'a str) -> Self {
        Self { conn, host }
    }

    /// Ingest every entry after the first `last_count`.
    ///
    /// Malformed entries are quarantined and still count toward the position.
    pub fn ingest(&self, path: &Path, last_count: i64) -> Result<SummaryPass> {
        if !path.exists() {
            warn!(host = %self.host, path = %path.display(), "Summary file not found");
            return Ok(SummaryPass::default());
        }

        let reader = BufReader::new(File::open(path)?);
        let mut classifier = LineClassifier::default();
        let mut pass = SummaryPass::default();

        for line in reader.split(b'\n') {
            let line = String::from_utf8_lossy(&line?).into_owned();
            let LineKind::Entry(body) = classifier.classify(&line) else {
                continue;
            };

            pass.position += 1;
            if pass.position <= last_count {
                continue;
            }

            let record = match parse_entry(body) {
                Ok(entry) => entry.into_record(self.host),
                Err(err) => {
                    let reason = err.to_string();
                    warn!(host = %self.host, position = pass.position, %reason, "Skipping malformed summary entry");
                    quarantine::record(
                        self.conn,
                        self.host,
                        Artifact::Summary,
                        pass.position,
                        line.trim(),
                        &reason,
                    )?;
                    continue;
                },
            };

            if !records::insert_received(self.conn, &record)? {
                continue;
            }

            pass.new_records += 1;
            debug!(
                host = %self.host,
                file = %record.filename,
                source = %record.source_host,
                "Recorded received file"
            );

            if let Some(date) = record.date() {
                daily::bump(self.conn, date, self.host, Direction::Received, record.size_bytes)?;
            }
        }

        info!(
            host = %self.host,
            new_records = pass.new_records,
            position = pass.position,
            "Summary pass complete"
        );
        Ok(pass)
    }
}
