//! SQLite-backed record store
//!
//! One database file holds hosts, checkpoints, both record tables, the
//! daily aggregates, the rejected-entry quarantine and run metadata. The
//! submodules are plain functions over `&Connection`, so they work the same
//! on a bare connection and inside a [`Transaction`].

pub mod checkpoint;
pub mod daily;
pub mod hosts;
pub mod metadata;
pub mod quarantine;
pub mod queries;
pub mod records;
pub mod schema;

use crate::error::Result;
use rusqlite::{Connection, Transaction, TransactionBehavior};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

/// Owned connection to the ingestion database
pub struct Store {
    conn: Connection,
}

impl Store {
    /// Open (creating if needed) the database at `path` and ensure the schema.
    ///
    /// `busy_timeout` bounds how long a writer waits for another process's
    /// write lock before failing.
    pub fn open(path: &Path, busy_timeout: Duration) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.busy_timeout(busy_timeout)?;
        let _mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        schema::init_schema(&conn)?;

        debug!(path = %path.display(), "Opened ingestion store");
        Ok(Self { conn })
    }

    /// In-memory store, mostly for tests
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        schema::init_schema(&conn)?;
        Ok(Self { conn })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Start the write transaction for one host's cycle.
    ///
    /// IMMEDIATE takes the database write lock before the checkpoint is read,
    /// so a cycle running in another process cannot read the same offsets.
    pub fn begin_cycle(&mut self) -> Result<Transaction<'_>> {
        Ok(self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?)
    }
}
