//! Drives one blocklist import from staleness check to committed filter.
//!
//! Order of an attempt: quiesce workloads, read config, decide whether to
//! download, fetch, open the reader, stream ranges into the filter, emit the
//! terminal events, restore workloads. Restoration happens on every path.

use crate::config::{ConfigKey, ConfigStore, ConfigValue, ImportConfig, ImportSettings};
use crate::error::{ConfigError, FilterStoreError, ImportError};
use crate::fetch::{FetchProgress, SourceFetcher};
use crate::filter::FilterStore;
use crate::format::{FormatReader, ListType};
use crate::progress::{ProgressEvent, ProgressSink};
use crate::staleness::{cache_modified, should_refetch, FetchMode};
use crate::workload::{QuiescenceGuard, WorkloadController};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::SystemTime;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// State owned by a single import attempt.
#[derive(Debug, Default)]
pub struct ImportSession {
    cancel: CancellationToken,
    imported: u64,
}

impl ImportSession {
    pub fn new(cancel: CancellationToken) -> Self {
        Self {
            cancel,
            imported: 0,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Ranges applied to the filter so far in this attempt.
    pub fn imported(&self) -> u64 {
        self.imported
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// Reader exhausted and filter committed.
    Completed { imported: u64 },
    /// Stopped on request. Applied ranges stay staged, nothing committed.
    Cancelled { applied: u64 },
}

/// Streams every range from `reader` into `filter`.
///
/// `filter.reset()` runs before the first range is read, so a decode or
/// filter error leaves only the ranges applied so far staged. Nothing is
/// rolled back and `commit` is skipped. The reader is closed on every path.
pub async fn apply(
    reader: &mut dyn FormatReader,
    filter: &dyn FilterStore,
    progress: &dyn ProgressSink,
    session: &mut ImportSession,
    progress_every: u64,
) -> Result<ApplyOutcome, ImportError> {
    let result = apply_ranges(reader, filter, progress, session, progress_every).await;
    reader.close();
    result
}

async fn apply_ranges(
    reader: &mut dyn FormatReader,
    filter: &dyn FilterStore,
    progress: &dyn ProgressSink,
    session: &mut ImportSession,
    progress_every: u64,
) -> Result<ApplyOutcome, ImportError> {
    let every = progress_every.max(1);
    session.imported = 0;
    filter.reset()?;

    loop {
        let range = match reader.next_range() {
            Ok(Some(range)) => range,
            Ok(None) => break,
            Err(source) => {
                return Err(ImportError::Decode {
                    applied: session.imported,
                    source,
                })
            }
        };

        filter.add_range(range)?;
        session.imported += 1;

        if session.imported % every == 0 {
            progress.emit(ProgressEvent::ImportProgress {
                count: session.imported,
            });
            // Let whoever renders progress catch up on large lists
            tokio::task::yield_now().await;
        } else {
            progress.emit(ProgressEvent::ImportTick);
        }

        if session.is_cancelled() {
            return Ok(ApplyOutcome::Cancelled {
                applied: session.imported,
            });
        }
    }

    filter.commit()?;
    Ok(ApplyOutcome::Completed {
        imported: session.imported,
    })
}

#[derive(Debug)]
pub enum ImportOutcome {
    Completed { imported: u64, fetched: bool },
    Cancelled { applied: u64 },
    Failed(ImportError),
}

impl ImportOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, ImportOutcome::Completed { .. })
    }
}

pub struct ImportOrchestrator {
    filter: Arc<dyn FilterStore>,
    workloads: Arc<dyn WorkloadController>,
    store: Arc<dyn ConfigStore>,
    progress: Arc<dyn ProgressSink>,
    fetcher: Arc<dyn SourceFetcher>,
    cache_path: PathBuf,
    settings: ImportSettings,
    shutdown: CancellationToken,
    current: Mutex<CancellationToken>,
    last_imported: AtomicU64,
}

impl ImportOrchestrator {
    pub fn new(
        filter: Arc<dyn FilterStore>,
        workloads: Arc<dyn WorkloadController>,
        store: Arc<dyn ConfigStore>,
        progress: Arc<dyn ProgressSink>,
        fetcher: Arc<dyn SourceFetcher>,
        cache_path: PathBuf,
        settings: ImportSettings,
    ) -> Self {
        Self {
            filter,
            workloads,
            store,
            progress,
            fetcher,
            cache_path,
            settings,
            shutdown: CancellationToken::new(),
            current: Mutex::new(CancellationToken::new()),
            last_imported: AtomicU64::new(0),
        }
    }

    pub fn cache_path(&self) -> &Path {
        &self.cache_path
    }

    pub fn is_configured(&self) -> bool {
        ImportConfig::from_store(self.store.as_ref()).url.is_some()
    }

    /// Asks the import in flight to stop after its current range.
    pub fn cancel(&self) {
        self.current.lock().unwrap().cancel();
    }

    /// Cancels the import in flight and every import started afterwards.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    /// Fires once [`ImportOrchestrator::shutdown`] has been called.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Range count of the last completed import.
    pub fn last_imported(&self) -> u64 {
        self.last_imported.load(Ordering::Relaxed)
    }

    pub fn status_line(&self) -> String {
        format!("[Blocklist: {} entries]", self.last_imported())
    }

    /// Import run when the host starts: reuses a fresh cache, and does
    /// nothing until a URL has been configured.
    pub async fn import_on_start(&self) -> Option<ImportOutcome> {
        if !self.is_configured() {
            info!("No blocklist URL configured, skipping start-up import");
            return None;
        }
        Some(self.import(FetchMode::UseCacheIfFresh).await)
    }

    /// Persists new import settings and immediately runs a forced import.
    pub async fn reconfigure(
        &self,
        url: &str,
        load_after_days: i64,
        list_type: ListType,
    ) -> Result<ImportOutcome, ConfigError> {
        self.store
            .set(ConfigKey::Url, ConfigValue::Text(url.to_string()))?;
        self.store
            .set(ConfigKey::LoadAfterDays, ConfigValue::Integer(load_after_days))?;
        self.store
            .set(ConfigKey::ListType, ConfigValue::ListType(list_type))?;
        self.store.save()?;

        Ok(self.import(FetchMode::Force).await)
    }

    /// Empties the live filter, as when the importer is disabled.
    pub fn clear_filter(&self) -> Result<(), FilterStoreError> {
        self.filter.reset()?;
        self.filter.commit()?;
        self.last_imported.store(0, Ordering::Relaxed);
        info!("Blocklist filter cleared");
        Ok(())
    }

    /// Runs one import attempt. Failures are reported through the progress
    /// sink and returned, never raised.
    pub async fn import(&self, mode: FetchMode) -> ImportOutcome {
        let mut session = self.begin_session();
        let quiescence = QuiescenceGuard::engage(self.workloads.clone());

        let outcome = match self.run(mode, &mut session).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("Blocklist import failed: {}", e);
                self.progress.emit(ProgressEvent::Error {
                    message: e.user_message(),
                });
                ImportOutcome::Failed(e)
            }
        };

        self.progress.emit(ProgressEvent::Stopped);
        quiescence.restore();
        outcome
    }

    fn begin_session(&self) -> ImportSession {
        let token = self.shutdown.child_token();
        *self.current.lock().unwrap() = token.clone();
        ImportSession::new(token)
    }

    async fn run(
        &self,
        mode: FetchMode,
        session: &mut ImportSession,
    ) -> Result<ImportOutcome, ImportError> {
        if session.is_cancelled() {
            info!("Shutting down, import skipped");
            return Ok(ImportOutcome::Cancelled { applied: 0 });
        }

        let config = ImportConfig::from_store(self.store.as_ref());
        let modified = cache_modified(&self.cache_path);
        let mut fetched = false;

        if should_refetch(modified, mode, config.load_after_days, SystemTime::now()) {
            let url = config.url.as_deref().ok_or(ImportError::NotConfigured)?;
            info!("New blocklist required, fetching {}", url);
            self.progress
                .emit(ProgressEvent::DownloadProgress { fraction: None });

            let progress = self.progress.clone();
            let mut on_progress = |p: FetchProgress| {
                progress.emit(ProgressEvent::DownloadProgress {
                    fraction: p.fraction(),
                });
            };

            let bytes = self
                .fetcher
                .fetch(url, &self.cache_path, &mut on_progress)
                .await?;
            info!("Downloaded {} bytes to {}", bytes, self.cache_path.display());
            fetched = true;
        } else {
            info!("Using cached blocklist at {}", self.cache_path.display());
        }

        if session.is_cancelled() {
            info!("Import cancelled before the filter was touched");
            return Ok(ImportOutcome::Cancelled { applied: 0 });
        }

        debug!("Importing with {}", config.list_type.label());
        let mut reader =
            config
                .list_type
                .open(&self.cache_path)
                .map_err(|source| ImportError::Open {
                    path: self.cache_path.clone(),
                    source,
                })?;

        self.progress.emit(ProgressEvent::ImportStarted);
        let outcome = apply(
            reader.as_mut(),
            self.filter.as_ref(),
            self.progress.as_ref(),
            session,
            self.settings.progress_every,
        )
        .await?;

        match outcome {
            ApplyOutcome::Completed { imported } => {
                self.last_imported.store(imported, Ordering::Relaxed);
                self.progress.emit(ProgressEvent::ImportEnded { imported });
                info!("Import finished, {} ranges", imported);
                Ok(ImportOutcome::Completed { imported, fetched })
            }
            ApplyOutcome::Cancelled { applied } => {
                warn!(
                    "Import cancelled after {} ranges, filter left uncommitted",
                    applied
                );
                Ok(ImportOutcome::Cancelled { applied })
            }
        }
    }
}
