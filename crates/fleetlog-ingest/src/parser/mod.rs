//! Incremental artifact parsers
//!
//! Each parser resumes from a position taken from the host's checkpoint,
//! writes new records through the store, and reports how far it got. Both
//! treat a missing artifact as "nothing new" and skip malformed input into
//! the quarantine instead of failing.

pub mod ledger;
pub mod summary;

pub use ledger::{LedgerParser, LedgerPass};
pub use summary::{parse_entry, EntryError, LineClassifier, LineKind, SummaryParser, SummaryPass};

/// Byte count from a normalized size, saturating at what SQLite can hold
pub(crate) fn size_to_i64(token: &str) -> i64 {
    i64::try_from(fleetlog_common::size::normalize(token)).unwrap_or(i64::MAX)
}
