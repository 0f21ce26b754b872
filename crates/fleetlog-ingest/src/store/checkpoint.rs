//! Per-host checkpoint persistence
//!
//! Only whole-checkpoint reads and writes are offered. A cycle reads the
//! checkpoint, parses from its offsets, and writes the complete new value
//! back in the same transaction.

use crate::error::Result;
use crate::models::Checkpoint;
use rusqlite::{params, Connection, OptionalExtension, Row};

/// Load the checkpoint for `host`, or a zero-valued one if it has none yet.
pub fn get(conn: &Connection, host: &str) -> Result<Checkpoint> {
    let checkpoint = conn
        .query_row(
            r#"
            SELECT host, last_ledger_line, last_summary_count, last_processed_at,
                   total_exchanges, total_received
            FROM checkpoints
            WHERE host = ?1
            "#,
            params![host],
            read_row,
        )
        .optional()?;

    Ok(checkpoint.unwrap_or_else(|| Checkpoint::empty(host)))
}

/// Replace the stored checkpoint for `checkpoint.host`.
pub fn put(conn: &Connection, checkpoint: &Checkpoint) -> Result<()> {
    conn.execute(
        r#"
        INSERT INTO checkpoints (
            host, last_ledger_line, last_summary_count, last_processed_at,
            total_exchanges, total_received, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, CURRENT_TIMESTAMP)
        ON CONFLICT(host) DO UPDATE SET
            last_ledger_line = excluded.last_ledger_line,
            last_summary_count = excluded.last_summary_count,
            last_processed_at = excluded.last_processed_at,
            total_exchanges = excluded.total_exchanges,
            total_received = excluded.total_received,
            updated_at = CURRENT_TIMESTAMP
        "#,
        params![
            checkpoint.host,
            checkpoint.last_ledger_line,
            checkpoint.last_summary_count,
            checkpoint.last_processed_at,
            checkpoint.total_exchanges,
            checkpoint.total_received,
        ],
    )?;

    Ok(())
}

/// All stored checkpoints, ordered by host
pub fn list(conn: &Connection) -> Result<Vec<Checkpoint>> {
    let mut stmt = conn.prepare(
        r#"
        SELECT host, last_ledger_line, last_summary_count, last_processed_at,
               total_exchanges, total_received
        FROM checkpoints
        ORDER BY host
        "#,
    )?;

    let checkpoints = stmt
        .query_map([], read_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(checkpoints)
}

fn read_row(row: &Row<'_>) -> rusqlite::Result<Checkpoint> {
    Ok(Checkpoint {
        host: row.get(0)?,
        last_ledger_line: row.get(1)?,
        last_summary_count: row.get(2)?,
        last_processed_at: row.get(3)?,
        total_exchanges: row.get(4)?,
        total_received: row.get(5)?,
    })
}
