//! Coarse progress events for whatever renders the import to the user.

use std::fmt;
use tracing::{debug, error, info, trace};

#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    /// Download advanced. `None` when the total size is unknown.
    DownloadProgress { fraction: Option<f64> },
    ImportStarted,
    /// One range applied; carries no count.
    ImportTick,
    /// Periodic count-bearing update.
    ImportProgress { count: u64 },
    ImportEnded { imported: u64 },
    /// Terminal event of every import attempt.
    Stopped,
    Error { message: String },
}

impl fmt::Display for ProgressEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProgressEvent::DownloadProgress { fraction: Some(p) } => {
                write!(f, "Downloading {:.0}%", p * 100.0)
            }
            ProgressEvent::DownloadProgress { fraction: None } => write!(f, "Downloading"),
            ProgressEvent::ImportStarted => write!(f, "Importing"),
            ProgressEvent::ImportTick => write!(f, "Importing"),
            ProgressEvent::ImportProgress { count } => write!(f, "Imported {} IPs", count),
            ProgressEvent::ImportEnded { imported } => {
                write!(f, "Import complete, {} ranges", imported)
            }
            ProgressEvent::Stopped => write!(f, "Stopped"),
            ProgressEvent::Error { message } => write!(f, "{}", message),
        }
    }
}

pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: ProgressEvent);
}

/// Renders progress through `tracing`. Ticks go to `trace` level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingProgress;

impl ProgressSink for TracingProgress {
    fn emit(&self, event: ProgressEvent) {
        match &event {
            ProgressEvent::ImportTick => trace!(target: "blocklist_progress", "{}", event),
            ProgressEvent::DownloadProgress { .. } => {
                debug!(target: "blocklist_progress", "{}", event)
            }
            ProgressEvent::Error { message } => {
                error!(target: "blocklist_progress", "Import failed: {}", message)
            }
            _ => info!(target: "blocklist_progress", "{}", event),
        }
    }
}
