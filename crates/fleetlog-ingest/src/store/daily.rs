//! Daily activity aggregates

use crate::error::Result;
use crate::models::Direction;
use rusqlite::{params, Connection};

/// Count one event of `direction` for (`date`, `host`) and add its bytes.
///
/// Not deduplicating: call exactly once per newly inserted record.
/// Byte totals saturate at `i64::MAX` so the columns stay INTEGER.
pub fn bump(
    conn: &Connection,
    date: &str,
    host: &str,
    direction: Direction,
    bytes: i64,
) -> Result<()> {
    let sql = match direction {
        Direction::Sent => {
            r#"
            INSERT INTO daily_activity (date, host, files_sent, bytes_sent)
            VALUES (?1, ?2, 1, ?3)
            ON CONFLICT(date, host) DO UPDATE SET
                files_sent = files_sent + 1,
                bytes_sent = CASE
                    WHEN bytes_sent > 9223372036854775807 - excluded.bytes_sent
                        THEN 9223372036854775807
                    ELSE bytes_sent + excluded.bytes_sent
                END
            "#
        },
        Direction::Received => {
            r#"
            INSERT INTO daily_activity (date, host, files_received, bytes_received)
            VALUES (?1, ?2, 1, ?3)
            ON CONFLICT(date, host) DO UPDATE SET
                files_received = files_received + 1,
                bytes_received = CASE
                    WHEN bytes_received > 9223372036854775807 - excluded.bytes_received
                        THEN 9223372036854775807
                    ELSE bytes_received + excluded.bytes_received
                END
            "#
        },
    };

    conn.prepare_cached(sql)?.execute(params![date, host, bytes])?;
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::store::{queries, Store};

    #[test]
    fn test_first_bump_creates_row() {
        let store = Store::open_in_memory().unwrap();
        let conn = store.connection();

        bump(conn, "2025-05-14", "ubuntu-server-1", Direction::Sent, 2048).unwrap();

        let rows = queries::list_daily_activity(conn, &Default::default()).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].files_sent, 1);
        assert_eq!(rows[0].bytes_sent, 2048);
        assert_eq!(rows[0].files_received, 0);
        assert_eq!(rows[0].bytes_received, 0);
    }

    #[test]
    fn test_bumps_accumulate_per_direction() {
        let store = Store::open_in_memory().unwrap();
        let conn = store.connection();

        bump(conn, "2025-05-14", "ubuntu-server-1", Direction::Sent, 100).unwrap();
        bump(conn, "2025-05-14", "ubuntu-server-1", Direction::Sent, 50).unwrap();
        bump(conn, "2025-05-14", "ubuntu-server-1", Direction::Received, 931).unwrap();
        bump(conn, "2025-05-15", "ubuntu-server-1", Direction::Received, 7).unwrap();

        let rows = queries::list_daily_activity(conn, &Default::default()).unwrap();
        assert_eq!(rows.len(), 2);

        let day = &rows[0];
        assert_eq!(day.date, "2025-05-14");
        assert_eq!((day.files_sent, day.bytes_sent), (2, 150));
        assert_eq!((day.files_received, day.bytes_received), (1, 931));

        let next = &rows[1];
        assert_eq!((next.files_sent, next.files_received, next.bytes_received), (0, 1, 7));
    }

    #[test]
    fn test_byte_totals_saturate() {
        let store = Store::open_in_memory().unwrap();
        let conn = store.connection();

        for _ in 0..2 {
            bump(conn, "2025-05-14", "ubuntu-server-1", Direction::Sent, i64::MAX).unwrap();
            bump(conn, "2025-05-14", "ubuntu-server-1", Direction::Received, i64::MAX).unwrap();
        }

        let rows = queries::list_daily_activity(conn, &Default::default()).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!((rows[0].files_sent, rows[0].bytes_sent), (2, i64::MAX));
        assert_eq!((rows[0].files_received, rows[0].bytes_received), (2, i64::MAX));
    }
}
