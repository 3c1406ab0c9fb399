//! Downloads a blocklist source into the local cache file.

use crate::config::FetchConfig;
use crate::error::FetchError;
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::{debug, info, warn};
use url::Url;

const LOCAL_CHUNK: usize = 64 * 1024;

/// Reported after every chunk written to disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchProgress {
    pub bytes_so_far: u64,
    pub chunk_size: usize,
    pub total: Option<u64>,
}

impl FetchProgress {
    /// `bytes_so_far / total` in [0, 1], or `None` if the total is unknown.
    pub fn fraction(&self) -> Option<f64> {
        match self.total {
            Some(total) if total > 0 => {
                Some((self.bytes_so_far as f64 / total as f64).clamp(0.0, 1.0))
            }
            _ => None,
        }
    }
}

#[async_trait]
pub trait SourceFetcher: Send + Sync {
    /// Copies `source` to `dest`, returning the number of bytes written.
    ///
    /// `dest` is replaced only once the transfer has completed.
    async fn fetch(
        &self,
        source: &str,
        dest: &Path,
        on_progress: &mut (dyn FnMut(FetchProgress) + Send),
    ) -> Result<u64, FetchError>;
}

#[derive(Debug, PartialEq, Eq)]
enum Source {
    Remote(Url),
    Local(PathBuf),
}

impl Source {
    fn classify(source: &str) -> Result<Self, FetchError> {
        match Url::parse(source) {
            Ok(url) => match url.scheme() {
                "http" | "https" => Ok(Source::Remote(url)),
                "file" => url
                    .to_file_path()
                    .map(Source::Local)
                    .map_err(|_| FetchError::UnsupportedSource(source.to_string())),
                // Drive letter of a Windows path
                scheme if scheme.len() == 1 => Ok(Source::Local(PathBuf::from(source))),
                _ => Err(FetchError::UnsupportedSource(source.to_string())),
            },
            Err(url::ParseError::RelativeUrlWithoutBase) => {
                Ok(Source::Local(PathBuf::from(source)))
            }
            Err(_) => Err(FetchError::UnsupportedSource(source.to_string())),
        }
    }
}

/// Fetches `http(s)://` URLs with reqwest and copies `file://` URLs or plain
/// paths from the local filesystem.
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(config: &FetchConfig) -> Result<Self, FetchError> {
        let client = Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .build()?;
        Ok(Self { client })
    }

    async fn download(
        &self,
        url: Url,
        part: &Path,
        on_progress: &mut (dyn FnMut(FetchProgress) + Send),
    ) -> Result<u64, FetchError> {
        let resp = self.client.get(url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status(status));
        }

        let total = resp.content_length();
        let mut file = fs::File::create(part).await?;
        let mut stream = resp.bytes_stream();
        let mut bytes_so_far = 0u64;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            bytes_so_far += chunk.len() as u64;
            on_progress(FetchProgress {
                bytes_so_far,
                chunk_size: chunk.len(),
                total,
            });
        }

        file.flush().await?;
        Ok(bytes_so_far)
    }

    async fn copy_local(
        path: &Path,
        part: &Path,
        on_progress: &mut (dyn FnMut(FetchProgress) + Send),
    ) -> Result<u64, FetchError> {
        let mut src = fs::File::open(path).await?;
        let total = src.metadata().await.ok().map(|m| m.len());
        let mut dst = fs::File::create(part).await?;
        let mut buf = vec![0u8; LOCAL_CHUNK];
        let mut bytes_so_far = 0u64;

        loop {
            let n = src.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            dst.write_all(&buf[..n]).await?;
            bytes_so_far += n as u64;
            on_progress(FetchProgress {
                bytes_so_far,
                chunk_size: n,
                total,
            });
        }

        dst.flush().await?;
        Ok(bytes_so_far)
    }
}

#[async_trait]
impl SourceFetcher for HttpFetcher {
    async fn fetch(
        &self,
        source: &str,
        dest: &Path,
        on_progress: &mut (dyn FnMut(FetchProgress) + Send),
    ) -> Result<u64, FetchError> {
        let source_kind = Source::classify(source)?;
        if let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }

        let part = part_path(dest);
        info!("Fetching blocklist from {}", source);
        let result = match source_kind {
            Source::Remote(url) => self.download(url, &part, on_progress).await,
            Source::Local(path) => Self::copy_local(&path, &part, on_progress).await,
        };

        match result {
            Ok(bytes) => {
                fs::rename(&part, dest).await?;
                debug!("Wrote {} bytes to {}", bytes, dest.display());
                Ok(bytes)
            }
            Err(e) => {
                warn!("Fetch of {} failed: {}", source, e);
                let _ = fs::remove_file(&part).await;
                Err(e)
            }
        }
    }
}

fn part_path(dest: &Path) -> PathBuf {
    let mut name = dest.as_os_str().to_owned();
    name.push(".part");
    PathBuf::from(name)
}
