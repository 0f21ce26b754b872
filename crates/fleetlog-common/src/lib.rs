//! Fleetlog Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared utilities for the fleetlog workspace.
//!
//! - **Logging**: `tracing` subscriber setup driven by [`logging::LogConfig`]
//! - **Sizes**: lenient parsing of human-readable size tokens
//!
//! # Example
//!
//! ```
//! use fleetlog_common::size;
//!
//! assert_eq!(size::normalize("1.5 KB"), 1536);
//! assert_eq!(size::normalize("not a size"), 0);
//! ```

pub mod logging;
pub mod size;

pub use logging::{init_logging, LogConfig, LogGuard};
