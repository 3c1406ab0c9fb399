#![allow(dead_code)]

use async_trait::async_trait;
use blocklist_import::config::{
    ConfigKey, ConfigStore, ConfigValue, FileConfigStore, ImportSettings, CACHE_FILE_NAME,
    STORE_FILE_NAME,
};
use blocklist_import::error::{FetchError, FilterStoreError};
use blocklist_import::fetch::{FetchProgress, SourceFetcher};
use blocklist_import::filter::FilterStore;
use blocklist_import::format::ListType;
use blocklist_import::progress::{ProgressEvent, ProgressSink};
use blocklist_import::workload::{WorkloadId, WorkloadRegistry};
use blocklist_import::{AddressRange, ImportOrchestrator};
use flate2::write::GzEncoder;
use flate2::Compression;
use std::io::Write;
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};
use tempfile::TempDir;

pub fn range(a: [u8; 4], b: [u8; 4]) -> AddressRange {
    AddressRange::new(Ipv4Addr::from(a), Ipv4Addr::from(b))
}

// --- Fixture files ---

pub fn p2b_bytes(ranges: &[AddressRange]) -> Vec<u8> {
    let mut raw = vec![0xFF, 0xFF, 0xFF, 0xFF];
    raw.extend_from_slice(b"P2B");
    raw.push(2);
    for (i, r) in ranges.iter().enumerate() {
        raw.extend_from_slice(format!("entry {}", i).as_bytes());
        raw.push(0);
        raw.extend_from_slice(&r.start.octets());
        raw.extend_from_slice(&r.end.octets());
    }
    gzip(&raw)
}

pub fn pg_text(ranges: &[AddressRange]) -> String {
    let mut out = String::from("# PeerGuardian text\n");
    for (i, r) in ranges.iter().enumerate() {
        out.push_str(&format!("Range {}:{}-{}\n", i, r.start, r.end));
    }
    out
}

pub fn emule_bytes(ranges: &[AddressRange]) -> Vec<u8> {
    let pad = |ip: Ipv4Addr| {
        let o = ip.octets();
        format!("{:03}.{:03}.{:03}.{:03}", o[0], o[1], o[2], o[3])
    };
    let mut out = String::new();
    for (i, r) in ranges.iter().enumerate() {
        out.push_str(&format!("{} - {} , 000 , entry {}\n", pad(r.start), pad(r.end), i));
    }
    gzip(out.as_bytes())
}

pub fn spzip_bytes(ranges: &[AddressRange]) -> Vec<u8> {
    use zip::write::SimpleFileOptions;

    let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
    writer
        .start_file("safepeer.txt", SimpleFileOptions::default())
        .unwrap();
    writer.write_all(pg_text(ranges).as_bytes()).unwrap();
    writer.finish().unwrap().into_inner()
}

pub fn encode(list_type: ListType, ranges: &[AddressRange]) -> Vec<u8> {
    match list_type {
        ListType::P2bGz => p2b_bytes(ranges),
        ListType::PgText => pg_text(ranges).into_bytes(),
        ListType::GzMule => emule_bytes(ranges),
        ListType::SpZip => spzip_bytes(ranges),
    }
}

pub fn gzip(data: &[u8]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

pub fn set_age(path: &Path, age: Duration) {
    let file = std::fs::File::options().write(true).open(path).unwrap();
    file.set_modified(SystemTime::now() - age).unwrap();
}

// --- Fakes ---

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterCall {
    Reset,
    Add(AddressRange),
    Commit,
}

type AddHook = Box<dyn Fn(usize) + Send + Sync>;

/// Filter store that records every call. `on_add` runs after each add with
/// the number of ranges added so far.
#[derive(Default)]
pub struct RecordingFilter {
    calls: Mutex<Vec<FilterCall>>,
    on_add: Mutex<Option<AddHook>>,
    reject_at: Mutex<Option<usize>>,
}

impl RecordingFilter {
    pub fn calls(&self) -> Vec<FilterCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn added(&self) -> Vec<AddressRange> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                FilterCall::Add(r) => Some(r),
                _ => None,
            })
            .collect()
    }

    pub fn commits(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| **c == FilterCall::Commit)
            .count()
    }

    pub fn on_add(&self, hook: impl Fn(usize) + Send + Sync + 'static) {
        *self.on_add.lock().unwrap() = Some(Box::new(hook));
    }

    pub fn reject_at(&self, n: usize) {
        *self.reject_at.lock().unwrap() = Some(n);
    }
}

impl FilterStore for RecordingFilter {
    fn reset(&self) -> Result<(), FilterStoreError> {
        self.calls.lock().unwrap().push(FilterCall::Reset);
        Ok(())
    }

    fn add_range(&self, range: AddressRange) -> Result<(), FilterStoreError> {
        let added = {
            let mut calls = self.calls.lock().unwrap();
            let added = calls
                .iter()
                .filter(|c| matches!(c, FilterCall::Add(_)))
                .count();
            if *self.reject_at.lock().unwrap() == Some(added + 1) {
                return Err(FilterStoreError::Rejected("engine full".into()));
            }
            calls.push(FilterCall::Add(range));
            added + 1
        };
        if let Some(hook) = self.on_add.lock().unwrap().as_ref() {
            hook(added);
        }
        Ok(())
    }

    fn commit(&self) -> Result<(), FilterStoreError> {
        self.calls.lock().unwrap().push(FilterCall::Commit);
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingProgress {
    events: Mutex<Vec<ProgressEvent>>,
}

impl RecordingProgress {
    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn errors(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                ProgressEvent::Error { message } => Some(message),
                _ => None,
            })
            .collect()
    }
}

impl ProgressSink for RecordingProgress {
    fn emit(&self, event: ProgressEvent) {
        self.events.lock().unwrap().push(event);
    }
}

/// Serves a fixed body, or fails, without touching the network.
#[derive(Default)]
pub struct FakeFetcher {
    body: Mutex<Option<Vec<u8>>>,
    calls: AtomicUsize,
}

impl FakeFetcher {
    pub fn serving(body: Vec<u8>) -> Self {
        Self {
            body: Mutex::new(Some(body)),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SourceFetcher for FakeFetcher {
    async fn fetch(
        &self,
        _source: &str,
        dest: &Path,
        on_progress: &mut (dyn FnMut(FetchProgress) + Send),
    ) -> Result<u64, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let body = self.body.lock().unwrap().clone();
        let Some(body) = body else {
            return Err(FetchError::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "connection refused",
            )));
        };

        let total = body.len() as u64;
        let half = body.len() / 2;
        on_progress(FetchProgress {
            bytes_so_far: half as u64,
            chunk_size: half,
            total: Some(total),
        });
        std::fs::write(dest, &body)?;
        on_progress(FetchProgress {
            bytes_so_far: total,
            chunk_size: body.len() - half,
            total: Some(total),
        });
        Ok(total)
    }
}

// --- Harness ---

pub struct Harness {
    pub dir: TempDir,
    pub filter: Arc<RecordingFilter>,
    pub progress: Arc<RecordingProgress>,
    pub fetcher: Arc<FakeFetcher>,
    pub workloads: Arc<WorkloadRegistry>,
    pub store: Arc<FileConfigStore>,
    pub orchestrator: Arc<ImportOrchestrator>,
}

impl Harness {
    /// Workloads 1 and 3 running, 2 already paused by the user.
    pub fn new(fetcher: FakeFetcher, list_type: ListType, url: Option<&str>) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let filter = Arc::new(RecordingFilter::default());
        let progress = Arc::new(RecordingProgress::default());
        let fetcher = Arc::new(fetcher);

        let workloads = Arc::new(WorkloadRegistry::new());
        workloads.register(WorkloadId(1), false);
        workloads.register(WorkloadId(2), true);
        workloads.register(WorkloadId(3), false);

        let store = Arc::new(FileConfigStore::new(dir.path().join(STORE_FILE_NAME)));
        if let Some(url) = url {
            store
                .set(ConfigKey::Url, ConfigValue::Text(url.to_string()))
                .unwrap();
        }
        store
            .set(ConfigKey::LoadAfterDays, ConfigValue::Integer(7))
            .unwrap();
        store
            .set(ConfigKey::ListType, ConfigValue::ListType(list_type))
            .unwrap();

        let orchestrator = Arc::new(ImportOrchestrator::new(
            filter.clone(),
            workloads.clone(),
            store.clone(),
            progress.clone(),
            fetcher.clone(),
            dir.path().join(CACHE_FILE_NAME),
            ImportSettings::default(),
        ));

        Self {
            dir,
            filter,
            progress,
            fetcher,
            workloads,
            store,
            orchestrator,
        }
    }

    pub fn cache_path(&self) -> PathBuf {
        self.dir.path().join(CACHE_FILE_NAME)
    }

    pub fn write_cache(&self, body: &[u8], age: Duration) {
        std::fs::write(self.cache_path(), body).unwrap();
        set_age(&self.cache_path(), age);
    }
}
