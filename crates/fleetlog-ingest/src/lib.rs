//! Fleetlog Ingest
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Incremental ingestion of per-host exchange artifacts into SQLite.
//!
//! Every host produces two artifacts: a CSV ledger of file exchanges and a
//! text summary of files it received. Each cycle reads only what was added
//! since the host's checkpoint, records it once, keeps per-day aggregates and
//! per-host totals current, and advances the checkpoint in the same
//! transaction.
//!
//! # Example
//!
//! ```no_run
//! use fleetlog_ingest::{HostConfig, IngestConfig, Ingestor};
//!
//! let config = IngestConfig::load(None)?;
//! let ingestor = Ingestor::from_config(&config);
//!
//! let summary = ingestor.run_cycle(&[HostConfig::new("ubuntu-server-1", "192.168.1.10")]);
//! println!("{} new exchanges", summary.new_exchanges);
//! # Ok::<(), fleetlog_ingest::IngestError>(())
//! ```

pub mod config;
pub mod error;
pub mod models;
pub mod orchestrator;
pub mod parser;
pub mod store;

pub use config::{HostConfig, IngestConfig};
pub use error::{IngestError, Result};
pub use orchestrator::{CycleSummary, HostReport, Ingestor};
pub use store::queries::{IngestStats, RecordFilter};
pub use store::Store;
