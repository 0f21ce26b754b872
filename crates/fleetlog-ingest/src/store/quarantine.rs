//! Rejected-entry quarantine
//!
//! Parsers advance their position counters past malformed input, so that
//! input is never retried. It is kept here instead, keyed by the position it
//! was found at, for operators to inspect.

use crate::error::Result;
use crate::models::{Artifact, RejectedEntry};
use rusqlite::types::Type;
use rusqlite::{params, Connection};

/// Store a skipped line. A second rejection at the same position is ignored.
pub fn record(
    conn: &Connection,
    host: &str,
    artifact: Artifact,
    position: i64,
    line: &str,
    reason: &str,
) -> Result<()> {
    conn.prepare_cached(
        r#"
        INSERT OR IGNORE INTO rejected_entries (host, artifact, position, line, reason, rejected_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        "#,
    )?
    .execute(params![
        host,
        artifact.as_str(),
        position,
        line,
        reason,
        chrono::Utc::now().to_rfc3339(),
    ])?;

    Ok(())
}

/// Rejected entries, optionally for one host, in host/artifact/position order
pub fn list(conn: &Connection, host: Option<&str>) -> Result<Vec<RejectedEntry>> {
    let mut stmt = conn.prepare(
        r#"
        SELECT host, artifact, position, line, reason, rejected_at
        FROM rejected_entries
        WHERE ?1 IS NULL OR host = ?1
        ORDER BY host, artifact, position
        "#,
    )?;

    let entries = stmt
        .query_map(params![host], |row| {
            let artifact: String = row.get(1)?;
            let artifact = artifact.parse::<Artifact>().map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(1, Type::Text, Box::new(e))
            })?;

            Ok(RejectedEntry {
                host: row.get(0)?,
                artifact,
                position: row.get(2)?,
                line: row.get(3)?,
                reason: row.get(4)?,
                rejected_at: row.get(5)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(entries)
}

pub fn count(conn: &Connection) -> Result<i64> {
    Ok(conn.query_row("SELECT COUNT(*) FROM rejected_entries", [], |row| row.get(0))?)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::store::Store;

    #[test]
    fn test_record_and_list_by_host() {
        let store = Store::open_in_memory().unwrap();
        let conn = store.connection();

        record(conn, "ubuntu-server-1", Artifact::Summary, 3, "- broken", "missing size").unwrap();
        record(conn, "ubuntu-server-2", Artifact::Ledger, 7, "\u{fffd}", "invalid UTF-8").unwrap();

        let all = list(conn, None).unwrap();
        assert_eq!(all.len(), 2);

        let one = list(conn, Some("ubuntu-server-1")).unwrap();
        assert_eq!(one.len(), 1);
        assert_eq!(one[0].artifact, Artifact::Summary);
        assert_eq!(one[0].position, 3);
        assert_eq!(one[0].reason, "missing size");
    }

    #[test]
    fn test_same_position_recorded_once() {
        let store = Store::open_in_memory().unwrap();
        let conn = store.connection();

        record(conn, "ubuntu-server-1", Artifact::Summary, 3, "- broken", "a").unwrap();
        record(conn, "ubuntu-server-1", Artifact::Summary, 3, "- broken", "b").unwrap();

        assert_eq!(count(conn).unwrap(), 1);
    }

    #[test]
    fn test_unknown_artifact_is_an_error() {
        let store = Store::open_in_memory().unwrap();
        let conn = store.connection();

        conn.execute(
            "INSERT INTO rejected_entries (host, artifact, position, line, reason, rejected_at) \
             VALUES ('ubuntu-server-1', 'journal', 1, 'x', 'y', 'z')",
            [],
        )
        .unwrap();

        let err = list(conn, None).unwrap_err();
        assert!(err.to_string().contains("journal"), "{err}");
    }
}
