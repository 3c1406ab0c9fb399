//! Error types for the import pipeline.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Raised by a format reader while turning bytes into ranges.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("invalid leader {0:#010x}")]
    InvalidLeader(u32),

    #[error("invalid magic code")]
    InvalidMagic,

    #[error("unsupported P2B version {0}")]
    UnsupportedVersion(u8),

    #[error("stream truncated inside record {record}")]
    Truncated { record: u64 },

    #[error("couldn't match on line {line}: {content}")]
    Malformed { line: u64, content: String },

    #[error("archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("read error: {0}")]
    Io(#[from] io::Error),
}

/// Raised while downloading a list into the cache file.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("server answered {0}")]
    Status(reqwest::StatusCode),

    #[error("unsupported source: {0}")]
    UnsupportedSource(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// The host filter refused an operation.
#[derive(Debug, Error)]
pub enum FilterStoreError {
    #[error("inverted range {start} - {end}")]
    InvertedRange {
        start: std::net::Ipv4Addr,
        end: std::net::Ipv4Addr,
    },

    #[error("filter rejected operation: {0}")]
    Rejected(String),
}

/// Raised by the persistent import configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unknown config key '{0}'")]
    UnknownKey(String),

    #[error("config key '{key}' expects {expected}")]
    TypeMismatch { key: &'static str, expected: &'static str },

    #[error("unknown list type '{0}'")]
    UnknownListType(String),

    #[error("failed to read {path}: {source}")]
    Read { path: PathBuf, source: io::Error },

    #[error("failed to write {path}: {source}")]
    Write { path: PathBuf, source: io::Error },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Every way one import attempt can fail.
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("download failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("couldn't open {path}: {source}")]
    Open { path: PathBuf, source: io::Error },

    #[error("decode failed after {applied} ranges: {source}")]
    Decode { applied: u64, source: DecodeError },

    #[error("filter store error: {0}")]
    FilterStore(#[from] FilterStoreError),

    #[error("no blocklist URL configured")]
    NotConfigured,
}

impl ImportError {
    /// Text shown to the user through the progress sink.
    pub fn user_message(&self) -> String {
        match self {
            ImportError::Fetch(e) => format!("Couldn't download URL: {}", e),
            ImportError::Open { source, .. } => {
                format!("Couldn't open blocklist file: {}", source)
            }
            ImportError::Decode { .. } => "Wrong file type or corrupted blocklist file.".to_string(),
            ImportError::FilterStore(e) => format!("The address filter rejected the list: {}", e),
            ImportError::NotConfigured => "No blocklist URL configured.".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_messages() {
        let err = ImportError::Decode {
            applied: 2,
            source: DecodeError::InvalidMagic,
        };
        assert_eq!(
            err.user_message(),
            "Wrong file type or corrupted blocklist file."
        );

        let err = ImportError::Fetch(FetchError::UnsupportedSource("ftp://x".into()));
        assert!(err.user_message().starts_with("Couldn't download URL: "));

        let err = ImportError::Open {
            path: PathBuf::from("blocklist.cache"),
            source: io::Error::new(io::ErrorKind::NotFound, "gone"),
        };
        assert_eq!(err.user_message(), "Couldn't open blocklist file: gone");

        assert_eq!(
            ImportError::NotConfigured.user_message(),
            "No blocklist URL configured."
        );
    }
}
