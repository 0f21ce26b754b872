//! Error types for fleetlog ingestion
//!
//! Errors only surface at host granularity: the orchestrator catches them,
//! logs them and moves on to the next host.

use thiserror::Error;

/// Result type alias for ingestion operations
pub type Result<T> = std::result::Result<T, IngestError>;

#[derive(Error, Debug)]
pub enum IngestError {
    /// SQLite operation failed
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Ledger could not be read at the I/O level
    #[error("Ledger read error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Fleet file is not valid TOML or does not match the expected shape
    #[error("Failed to parse fleet configuration: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    /// A per-host pipeline panicked; the message is the panic payload
    #[error("Ingestion panicked: {0}")]
    Panic(String),
}

impl IngestError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}
