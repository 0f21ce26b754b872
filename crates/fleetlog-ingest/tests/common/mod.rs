//! Shared fixtures for fleetlog-ingest integration tests
//!
//! A [`Fleet`] is a temporary directory laid out like a real deployment:
//!
//! ```text
//! <tmp>/monitor.db
//! <tmp>/exchange_results/<host>/logs/history.csv
//! <tmp>/exchange_results/<host>/logs/received_summary.txt
//! ```

#![allow(dead_code)]

use fleetlog_ingest::config::{LEDGER_FILE, SUMMARY_FILE};
use fleetlog_ingest::{HostConfig, Ingestor, Store};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;
use tempfile::TempDir;

pub const LEDGER_HEADER: &str = "timestamp,hostname,action,target_servers,file,status,size";

pub struct Fleet {
    dir: TempDir,
}

impl Fleet {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("Failed to create temp dir"),
        }
    }

    pub fn path(&self) -> PathBuf {
        self.dir.path().to_path_buf()
    }

    pub fn db_path(&self) -> PathBuf {
        self.dir.path().join("monitor.db")
    }

    pub fn artifact_root(&self) -> PathBuf {
        self.dir.path().join("exchange_results")
    }

    pub fn ingestor(&self) -> Ingestor {
        Ingestor::new(self.db_path(), self.artifact_root(), Duration::from_secs(10))
    }

    pub fn host(&self, name: &str) -> HostConfig {
        HostConfig::new(name, format!("10.0.0.{}", name.len()))
    }

    pub fn store(&self) -> Store {
        Store::open(&self.db_path(), Duration::from_secs(10)).expect("Failed to open store")
    }

    pub fn logs_dir(&self, host: &str) -> PathBuf {
        let dir = self.artifact_root().join(host).join("logs");
        fs::create_dir_all(&dir).expect("Failed to create logs dir");
        dir
    }

    pub fn ledger_path(&self, host: &str) -> PathBuf {
        self.logs_dir(host).join(LEDGER_FILE)
    }

    pub fn summary_path(&self, host: &str) -> PathBuf {
        self.logs_dir(host).join(SUMMARY_FILE)
    }

    /// Replace the host's ledger with a header and `rows`
    pub fn write_ledger(&self, host: &str, rows: &[String]) {
        let mut contents = format!("{LEDGER_HEADER}\n");
        for row in rows {
            contents.push_str(row);
            contents.push('\n');
        }
        fs::write(self.ledger_path(host), contents).expect("Failed to write ledger");
    }

    /// Append rows the way the producer does between cycles
    pub fn append_ledger(&self, host: &str, rows: &[String]) {
        let mut file = OpenOptions::new()
            .append(true)
            .open(self.ledger_path(host))
            .expect("Failed to open ledger");
        for row in rows {
            writeln!(file, "{row}").expect("Failed to append ledger row");
        }
    }

    /// Rewrite the host's summary report with `entries` in its files section
    pub fn write_summary(&self, host: &str, entries: &[String]) {
        let mut contents = format!("Exchange report for {host}\n\nFiles Received:\n");
        for entry in entries {
            contents.push_str("- ");
            contents.push_str(entry);
            contents.push('\n');
        }
        contents.push_str(&format!("Total Files: {}\n", entries.len()));
        fs::write(self.summary_path(host), contents).expect("Failed to write summary");
    }
}

pub fn sent_row(timestamp: &str, host: &str, target: &str, file: &str, size: &str) -> String {
    format!("{timestamp},{host},sent,{target},{file},success,{size}")
}

pub fn summary_entry(source: &str, stamp: &str, size: u64, date: &str) -> String {
    format!("from_{source}_{stamp}.txt (Size: {size} bytes, Date: {date}.123456789Z +0000 UTC)")
}

/// `n` sent rows for `host`, one minute apart on 2025-05-14
pub fn sent_rows(host: &str, n: usize) -> Vec<String> {
    (0..n)
        .map(|i| {
            sent_row(
                &format!("2025-05-14 {:02}:{:02}:00", i / 60, i % 60),
                host,
                "ubuntu-server-9",
                &format!("file_{i}.txt"),
                "1 KB",
            )
        })
        .collect()
}

/// `n` received entries from `ubuntu-server-2`, one second apart on 2025-05-14
pub fn summary_entries(n: usize) -> Vec<String> {
    (0..n)
        .map(|i| {
            summary_entry(
                "ubuntu-server-2",
                &format!("20250514_0100{i:02}"),
                100,
                &format!("2025-05-14 01:00:{i:02}"),
            )
        })
        .collect()
}
