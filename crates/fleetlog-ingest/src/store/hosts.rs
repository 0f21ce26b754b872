//! Host entity and lifetime totals

use crate::error::Result;
use crate::models::{Host, ACTION_SENT};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::info;

/// Recompute `host`'s lifetime totals from the record tables and upsert it.
///
/// This is a full recount, not a delta, so it also repairs totals that
/// drifted through earlier incremental updates.
pub fn refresh_totals(conn: &Connection, host: &str, address: &str) -> Result<Host> {
    let sent: i64 = conn.query_row(
        "SELECT COUNT(*) FROM exchanges WHERE host = ?1 AND action = ?2",
        params![host, ACTION_SENT],
        |row| row.get(0),
    )?;

    let received: i64 = conn.query_row(
        "SELECT COUNT(*) FROM received_files WHERE host = ?1",
        params![host],
        |row| row.get(0),
    )?;

    let last_exchange: Option<String> = conn.query_row(
        "SELECT MAX(timestamp) FROM exchanges WHERE host = ?1 AND timestamp <> ''",
        params![host],
        |row| row.get(0),
    )?;

    conn.execute(
        r#"
        INSERT INTO hosts (name, address, sent, received, last_exchange, updated_at)
        VALUES (?1, ?2, ?3, ?4, ?5, CURRENT_TIMESTAMP)
        ON CONFLICT(name) DO UPDATE SET
            address = excluded.address,
            sent = excluded.sent,
            received = excluded.received,
            last_exchange = excluded.last_exchange,
            updated_at = CURRENT_TIMESTAMP
        "#,
        params![host, address, sent, received, last_exchange],
    )?;

    info!(host = %host, sent, received, "Updated host totals");

    Ok(Host {
        name: host.to_string(),
        address: address.to_string(),
        sent,
        received,
        last_exchange,
    })
}

pub fn get(conn: &Connection, name: &str) -> Result<Option<Host>> {
    let host = conn
        .query_row(
            "SELECT name, address, sent, received, last_exchange FROM hosts WHERE name = ?1",
            params![name],
            |row| {
                Ok(Host {
                    name: row.get(0)?,
                    address: row.get(1)?,
                    sent: row.get(2)?,
                    received: row.get(3)?,
                    last_exchange: row.get(4)?,
                })
            },
        )
        .optional()?;

    Ok(host)
}
