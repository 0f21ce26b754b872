//! SQLite schema for the ingestion store

use crate::error::Result;
use rusqlite::Connection;

/// Create all tables and indexes. Safe to run on every open.
pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS hosts (
            name TEXT PRIMARY KEY,
            address TEXT NOT NULL,
            sent INTEGER NOT NULL DEFAULT 0,
            received INTEGER NOT NULL DEFAULT 0,
            last_exchange TEXT,
            updated_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP
        );

        CREATE TABLE IF NOT EXISTS checkpoints (
            host TEXT PRIMARY KEY,
            last_ledger_line INTEGER NOT NULL DEFAULT 0,
            last_summary_count INTEGER NOT NULL DEFAULT 0,
            last_processed_at TEXT,
            total_exchanges INTEGER NOT NULL DEFAULT 0,
            total_received INTEGER NOT NULL DEFAULT 0,
            updated_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP
        );

        CREATE TABLE IF NOT EXISTS exchanges (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            host TEXT NOT NULL,
            timestamp TEXT NOT NULL,
            hostname TEXT NOT NULL,
            action TEXT NOT NULL,
            target_servers TEXT NOT NULL,
            filename TEXT NOT NULL,
            status TEXT NOT NULL,
            size_bytes INTEGER NOT NULL DEFAULT 0,
            created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
            UNIQUE(host, timestamp, filename, action)
        );

        CREATE TABLE IF NOT EXISTS received_files (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            host TEXT NOT NULL,
            filename TEXT NOT NULL,
            source_host TEXT NOT NULL,
            received_date TEXT NOT NULL,
            size_raw TEXT NOT NULL,
            size_bytes INTEGER NOT NULL DEFAULT 0,
            created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
            UNIQUE(host, filename, received_date)
        );

        CREATE TABLE IF NOT EXISTS daily_activity (
            date TEXT NOT NULL,
            host TEXT NOT NULL,
            files_sent INTEGER NOT NULL DEFAULT 0,
            files_received INTEGER NOT NULL DEFAULT 0,
            bytes_sent INTEGER NOT NULL DEFAULT 0,
            bytes_received INTEGER NOT NULL DEFAULT 0,
            PRIMARY KEY (date, host)
        );

        -- malformed input skipped by the positional counters
        CREATE TABLE IF NOT EXISTS rejected_entries (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            host TEXT NOT NULL,
            artifact TEXT NOT NULL,
            position INTEGER NOT NULL,
            line TEXT NOT NULL,
            reason TEXT NOT NULL,
            rejected_at TEXT NOT NULL,
            UNIQUE(host, artifact, position)
        );

        CREATE TABLE IF NOT EXISTS metadata (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_exchanges_host_action ON exchanges(host, action);
        CREATE INDEX IF NOT EXISTS idx_exchanges_timestamp ON exchanges(timestamp);
        CREATE INDEX IF NOT EXISTS idx_received_host_date ON received_files(host, received_date);
        CREATE INDEX IF NOT EXISTS idx_daily_host ON daily_activity(host);
        "#,
    )?;

    Ok(())
}
