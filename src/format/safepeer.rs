use super::{excerpt, pg_text, FormatReader};
use crate::error::DecodeError;
use crate::range::AddressRange;
use std::fs::File;
use std::io::{self, BufRead, Cursor, Read, Seek};
use std::path::Path;
use zip::ZipArchive;

/// SafePeer list: a zip archive whose file entries hold PeerGuardian-style
/// text lines. Entries are read in archive order, one entry in memory at a time.
pub struct SafePeerReader<R: Read + Seek> {
    source: Option<R>,
    archive: Option<ZipArchive<R>>,
    next_entry: usize,
    current: Option<Cursor<Vec<u8>>>,
    entry_name: String,
    line_no: u64,
    buf: Vec<u8>,
}

impl SafePeerReader<File> {
    pub fn open(path: &Path) -> io::Result<Self> {
        Ok(Self::from_reader(File::open(path)?))
    }
}

impl<R: Read + Seek> SafePeerReader<R> {
    pub fn from_reader(reader: R) -> Self {
        Self {
            source: Some(reader),
            archive: None,
            next_entry: 0,
            current: None,
            entry_name: String::new(),
            line_no: 0,
            buf: Vec::new(),
        }
    }

    /// Loads the next file entry. Returns false when the archive is exhausted.
    fn advance_entry(&mut self) -> Result<bool, DecodeError> {
        if let Some(source) = self.source.take() {
            self.archive = Some(ZipArchive::new(source)?);
        }
        let Some(archive) = self.archive.as_mut() else {
            return Ok(false);
        };

        while self.next_entry < archive.len() {
            let mut entry = archive.by_index(self.next_entry)?;
            self.next_entry += 1;
            if entry.is_dir() {
                continue;
            }

            let mut data = Vec::with_capacity(entry.size() as usize);
            entry.read_to_end(&mut data)?;
            self.entry_name = entry.name().to_string();
            self.current = Some(Cursor::new(data));
            self.line_no = 0;
            return Ok(true);
        }
        Ok(false)
    }
}

impl<R: Read + Seek + Send> FormatReader for SafePeerReader<R> {
    fn next_range(&mut self) -> Result<Option<AddressRange>, DecodeError> {
        loop {
            if let Some(current) = self.current.as_mut() {
                self.buf.clear();
                if current.read_until(b'\n', &mut self.buf)? > 0 {
                    self.line_no += 1;
                    let line = String::from_utf8_lossy(&self.buf);
                    let line = line.trim();
                    if line.is_empty() || line.starts_with('#') {
                        continue;
                    }
                    return match pg_text::parse_line(line) {
                        Some(range) => Ok(Some(range)),
                        None => Err(DecodeError::Malformed {
                            line: self.line_no,
                            content: format!("{}: {}", self.entry_name, excerpt(line)),
                        }),
                    };
                }
                self.current = None;
            }

            if !self.advance_entry()? {
                return Ok(None);
            }
        }
    }

    fn close(&mut self) {
        self.source = None;
        self.archive = None;
        self.current = None;
    }
}
