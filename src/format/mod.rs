//! Blocklist encodings.
//!
//! Each list type has its own reader; they share nothing but the
//! [`FormatReader`] capability and the [`ListType`] selector.

mod emule;
mod p2b;
mod pg_text;
mod safepeer;

pub use emule::EmuleReader;
pub use p2b::P2bReader;
pub use pg_text::PgTextReader;
pub use safepeer::SafePeerReader;

use crate::error::{ConfigError, DecodeError};
use crate::range::AddressRange;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io;
use std::path::Path;
use std::str::FromStr;

/// A lazy, non-restartable sequence of address ranges decoded from one file.
pub trait FormatReader: Send {
    /// Returns the next range, or `None` once the input is exhausted.
    fn next_range(&mut self) -> Result<Option<AddressRange>, DecodeError>;

    /// Releases the underlying file. Further calls to `next_range` yield `None`.
    fn close(&mut self);
}

/// Selects which reader decodes the cache file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListType {
    /// PeerGuardian P2B, gzip compressed.
    #[default]
    P2bGz,
    /// PeerGuardian text, uncompressed.
    PgText,
    /// eMule ipfilter.dat, gzip compressed.
    GzMule,
    /// SafePeer text, zipped.
    SpZip,
}

impl ListType {
    pub const ALL: [ListType; 4] = [
        ListType::P2bGz,
        ListType::PgText,
        ListType::GzMule,
        ListType::SpZip,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ListType::P2bGz => "p2bgz",
            ListType::PgText => "pgtext",
            ListType::GzMule => "gzmule",
            ListType::SpZip => "spzip",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ListType::P2bGz => "PeerGuardian P2B (GZip)",
            ListType::PgText => "PeerGuardian Text (Uncompressed)",
            ListType::GzMule => "Emule IP list (GZip)",
            ListType::SpZip => "SafePeer Text (Zipped)",
        }
    }

    /// Opens `path` with the reader for this list type.
    ///
    /// Only the file itself is opened here. Headers and archive directories are
    /// checked on the first `next_range`, so a file of the wrong type surfaces
    /// as a [`DecodeError`] rather than an I/O error.
    pub fn open(&self, path: impl AsRef<Path>) -> io::Result<Box<dyn FormatReader>> {
        let path = path.as_ref();
        Ok(match self {
            ListType::P2bGz => Box::new(P2bReader::open(path)?),
            ListType::PgText => Box::new(PgTextReader::open(path)?),
            ListType::GzMule => Box::new(EmuleReader::open(path)?),
            ListType::SpZip => Box::new(SafePeerReader::open(path)?),
        })
    }
}

impl fmt::Display for ListType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ListType {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ListType::ALL
            .into_iter()
            .find(|t| t.as_str() == s.trim())
            .ok_or_else(|| ConfigError::UnknownListType(s.to_string()))
    }
}

/// Shortens a rejected line so binary garbage doesn't flood the logs.
pub(crate) fn excerpt(line: &str) -> String {
    const MAX: usize = 80;
    let mut out: String = line.chars().take(MAX).collect();
    if line.chars().count() > MAX {
        out.push_str("...");
    }
    out
}
