//! Ingestion cycle orchestrator
//!
//! A cycle walks the configured hosts in order. Each host is ingested in its
//! own write transaction: read the checkpoint, run both parsers, write the
//! advanced checkpoint, recount host totals, commit. A failing host is
//! rolled back and reported, and the cycle moves on.

use crate::config::{HostConfig, IngestConfig};
use crate::error::{IngestError, Result};
use crate::models::Checkpoint;
use crate::parser::{LedgerParser, SummaryParser};
use crate::store::{checkpoint, hosts, metadata, Store};
use chrono::Utc;
use serde::Serialize;
use std::any::Any;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tracing::{error, info, info_span, warn};

/// Address stored for hosts configured without one
const UNKNOWN_ADDRESS: &str = "unknown";

const LAST_UPDATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Host whose pipeline panics after its ledger pass
#[cfg(test)]
const PANICKING_HOST: &str = "panicking-host-1";

/// What one host contributed to a cycle
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HostReport {
    pub host: String,
    pub new_exchanges: i64,
    pub new_received: i64,
    /// Cumulative totals from the host's checkpoint after this cycle
    pub total_exchanges: i64,
    pub total_received: i64,
    pub ledger_position: i64,
    pub summary_position: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl HostReport {
    fn empty(host: &str) -> Self {
        Self {
            host: host.to_string(),
            ..Self::default()
        }
    }

    fn failed(host: &str, error: String) -> Self {
        Self {
            error: Some(error),
            ..Self::empty(host)
        }
    }

    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }
}

/// Totals over one cycle
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CycleSummary {
    pub new_exchanges: i64,
    pub new_received: i64,
    /// Sum of every reported host's cumulative exchanges and received files
    pub total_historical: i64,
    pub hosts: Vec<HostReport>,
}

impl CycleSummary {
    fn push(&mut self, report: HostReport) {
        self.new_exchanges += report.new_exchanges;
        self.new_received += report.new_received;
        self.total_historical += report.total_exchanges + report.total_received;
        self.hosts.push(report);
    }

    pub fn failed_hosts(&self) -> impl Iterator<Item = &HostReport> {
        self.hosts.iter().filter(|h| h.is_failed())
    }
}

/// Per-host mutual exclusion within one process
#[derive(Debug, Default)]
pub struct HostLocks {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl HostLocks {
    /// The lock for `host`, created on first use
    pub fn get(&self, host: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(locks.entry(host.to_string()).or_default())
    }
}

/// Runs ingestion cycles against one database.
///
/// Cheap to share behind an `Arc`: overlapping `run_cycle` calls serialize
/// per host instead of reading the same checkpoint twice.
#[derive(Debug)]
pub struct Ingestor {
    database_path: PathBuf,
    artifact_root: PathBuf,
    busy_timeout: Duration,
    locks: HostLocks,
}

impl Ingestor {
    pub fn new(
        database_path: impl Into<PathBuf>,
        artifact_root: impl Into<PathBuf>,
        busy_timeout: Duration,
    ) -> Self {
        Self {
            database_path: database_path.into(),
            artifact_root: artifact_root.into(),
            busy_timeout,
            locks: HostLocks::default(),
        }
    }

    pub fn from_config(config: &IngestConfig) -> Self {
        Self::new(
            config.database_path.clone(),
            config.artifact_root.clone(),
            config.busy_timeout(),
        )
    }

    /// Open a connection to the ingestion database
    pub fn open_store(&self) -> Result<Store> {
        Store::open(&self.database_path, self.busy_timeout)
    }

    /// Ingest everything new for `hosts`, in order.
    ///
    /// Never fails as a whole: per-host errors end up in the host's report.
    pub fn run_cycle(&self, hosts: &[HostConfig]) -> CycleSummary {
        let started = Instant::now();
        info!(hosts = hosts.len(), "Starting ingestion cycle");

        let mut summary = CycleSummary::default();
        for host in hosts {
            let span = info_span!("host", host = %host.name);
            let _entered = span.enter();
            summary.push(self.run_host(host));
        }

        if let Err(e) = self.record_completion() {
            error!(error = %e, "Failed to record cycle completion");
        }

        info!(
            new_exchanges = summary.new_exchanges,
            new_received = summary.new_received,
            total_historical = summary.total_historical,
            failed = summary.failed_hosts().count(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Ingestion cycle complete"
        );
        summary
    }

    fn run_host(&self, host: &HostConfig) -> HostReport {
        let lock = self.locks.get(&host.name);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.ingest_host(host)))
            .unwrap_or_else(|payload| Err(IngestError::Panic(panic_message(payload))));

        match outcome {
            Ok(report) => report,
            Err(e) => {
                error!(error = %e, "Host ingestion failed, changes rolled back");
                HostReport::failed(&host.name, e.to_string())
            },
        }
    }

    fn ingest_host(&self, host: &HostConfig) -> Result<HostReport> {
        if host.artifacts_missing(&self.artifact_root) {
            warn!(
                root = %self.artifact_root.display(),
                "No artifacts found for host, skipping"
            );
            return Ok(HostReport::empty(&host.name));
        }

        let mut store = self.open_store()?;
        let tx = store.begin_cycle()?;
        let previous = checkpoint::get(&tx, &host.name)?;

        let ledger = LedgerParser::new(&tx, &host.name)
            .ingest(&host.ledger_path(&self.artifact_root), previous.last_ledger_line)?;

        #[cfg(test)]
        if host.name == PANICKING_HOST {
            panic!("ledger pass for {} wrote {} rows", host.name, ledger.new_records);
        }

        let summary = SummaryParser::new(&tx, &host.name)
            .ingest(&host.summary_path(&self.artifact_root), previous.last_summary_count)?;

        if ledger.position < previous.last_ledger_line {
            warn!(
                checkpoint = previous.last_ledger_line,
                rows = ledger.position,
                "Ledger is shorter than its checkpoint, keeping the checkpoint"
            );
        }
        if summary.position < previous.last_summary_count {
            warn!(
                checkpoint = previous.last_summary_count,
                entries = summary.position,
                "Summary has fewer entries than its checkpoint, keeping the checkpoint"
            );
        }

        let next = Checkpoint {
            host: host.name.clone(),
            last_ledger_line: previous.last_ledger_line.max(ledger.position),
            last_summary_count: previous.last_summary_count.max(summary.position),
            last_processed_at: Some(Utc::now().to_rfc3339()),
            total_exchanges: previous.total_exchanges + ledger.new_records,
            total_received: previous.total_received + summary.new_records,
        };
        checkpoint::put(&tx, &next)?;

        let address = if host.address.is_empty() {
            UNKNOWN_ADDRESS
        } else {
            host.address.as_str()
        };
        hosts::refresh_totals(&tx, &host.name, address)?;

        tx.commit()?;

        info!(
            new_exchanges = ledger.new_records,
            new_received = summary.new_records,
            ledger_position = next.last_ledger_line,
            summary_position = next.last_summary_count,
            "Host ingested"
        );

        Ok(HostReport {
            host: host.name.clone(),
            new_exchanges: ledger.new_records,
            new_received: summary.new_records,
            total_exchanges: next.total_exchanges,
            total_received: next.total_received,
            ledger_position: next.last_ledger_line,
            summary_position: next.last_summary_count,
            error: None,
        })
    }

    fn record_completion(&self) -> Result<()> {
        let store = self.open_store()?;
        let now = Utc::now();

        metadata::set(
            store.connection(),
            metadata::LAST_UPDATE,
            &now.format(LAST_UPDATE_FORMAT).to_string(),
        )?;
        metadata::set(
            store.connection(),
            metadata::LAST_INCREMENTAL_UPDATE,
            &now.to_rfc3339(),
        )?;
        Ok(())
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
