//! Inserts for exchange and received-file records
//!
//! Both inserts ignore uniqueness conflicts and report whether a row was
//! actually written. Callers only feed the daily aggregates on `true`.

use crate::error::Result;
use crate::models::{ExchangeRecord, ReceivedFileRecord};
use rusqlite::{params, Connection};

/// Insert a ledger row. Returns `false` if (host, timestamp, filename, action)
/// is already stored.
pub fn insert_exchange(conn: &Connection, record: &ExchangeRecord) -> Result<bool> {
    let mut stmt = conn.prepare_cached(
        r#"
        INSERT OR IGNORE INTO exchanges (
            host, timestamp, hostname, action, target_servers, filename, status, size_bytes
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        "#,
    )?;

    let inserted = stmt.execute(params![
        record.host,
        record.timestamp,
        record.hostname,
        record.action,
        record.target_servers,
        record.filename,
        record.status,
        record.size_bytes,
    ])?;

    Ok(inserted == 1)
}

/// Insert a received-file entry. Returns `false` if (host, filename,
/// received_date) is already stored.
pub fn insert_received(conn: &Connection, record: &ReceivedFileRecord) -> Result<bool> {
    let mut stmt = conn.prepare_cached(
        r#"
        INSERT OR IGNORE INTO received_files (
            host, filename, source_host, received_date, size_raw, size_bytes
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        "#,
    )?;

    let inserted = stmt.execute(params![
        record.host,
        record.filename,
        record.source_host,
        record.received_date,
        record.size_raw,
        record.size_bytes,
    ])?;

    Ok(inserted == 1)
}
