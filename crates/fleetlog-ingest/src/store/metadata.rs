//! Key/value run metadata

use crate::error::Result;
use rusqlite::{params, Connection, OptionalExtension};

/// Wall-clock time of the last completed cycle, `%Y-%m-%d %H:%M:%S`
pub const LAST_UPDATE: &str = "last_update";

/// Same instant as [`LAST_UPDATE`], RFC 3339
pub const LAST_INCREMENTAL_UPDATE: &str = "last_incremental_update";

pub fn set(conn: &Connection, key: &str, value: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO metadata (key, value) VALUES (?1, ?2)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        params![key, value],
    )?;
    Ok(())
}

pub fn get(conn: &Connection, key: &str) -> Result<Option<String>> {
    let value = conn
        .query_row(
            "SELECT value FROM metadata WHERE key = ?1",
            params![key],
            |row| row.get(0),
        )
        .optional()?;
    Ok(value)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::store::Store;

    #[test]
    fn test_set_overwrites() {
        let store = Store::open_in_memory().unwrap();
        let conn = store.connection();

        assert_eq!(get(conn, LAST_UPDATE).unwrap(), None);
        set(conn, LAST_UPDATE, "2025-05-14 01:00:00").unwrap();
        set(conn, LAST_UPDATE, "2025-05-14 02:00:00").unwrap();
        assert_eq!(
            get(conn, LAST_UPDATE).unwrap().as_deref(),
            Some("2025-05-14 02:00:00")
        );
    }
}
