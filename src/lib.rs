//! Blocklist importer.
//!
//! Downloads third-party IP blocklists in one of several encodings and merges
//! their address ranges into a live address filter, pausing unrelated
//! workloads while the filter is rebuilt.

pub mod config;
pub mod error;
pub mod fetch;
pub mod filter;
pub mod format;
pub mod init;
pub mod orchestrator;
pub mod progress;
pub mod range;
pub mod staleness;
pub mod workload;

pub use error::ImportError;
pub use orchestrator::{ImportOrchestrator, ImportOutcome};
pub use range::AddressRange;
