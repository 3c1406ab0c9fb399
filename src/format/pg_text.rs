use super::{excerpt, FormatReader};
use crate::error::DecodeError;
use crate::range::{parse_ipv4_lenient, AddressRange};
use std::fs::File;
use std::io::{self, BufRead, BufReader, Read};
use std::path::Path;

/// PeerGuardian text list: one `description:start-end` entry per line.
pub struct PgTextReader<R: Read> {
    inner: Option<BufReader<R>>,
    line_no: u64,
    buf: Vec<u8>,
}

impl PgTextReader<File> {
    pub fn open(path: &Path) -> io::Result<Self> {
        Ok(Self::from_reader(File::open(path)?))
    }
}

impl<R: Read> PgTextReader<R> {
    pub fn from_reader(reader: R) -> Self {
        Self {
            inner: Some(BufReader::new(reader)),
            line_no: 0,
            buf: Vec::new(),
        }
    }
}

impl<R: Read + Send> FormatReader for PgTextReader<R> {
    fn next_range(&mut self) -> Result<Option<AddressRange>, DecodeError> {
        let Some(reader) = self.inner.as_mut() else {
            return Ok(None);
        };

        loop {
            self.buf.clear();
            if reader.read_until(b'\n', &mut self.buf)? == 0 {
                return Ok(None);
            }
            self.line_no += 1;

            let line = String::from_utf8_lossy(&self.buf);
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            return match parse_line(line) {
                Some(range) => Ok(Some(range)),
                None => Err(DecodeError::Malformed {
                    line: self.line_no,
                    content: excerpt(line),
                }),
            };
        }
    }

    fn close(&mut self) {
        self.inner = None;
    }
}

/// Parses `description:start-end`. The description may itself contain colons.
pub(crate) fn parse_line(line: &str) -> Option<AddressRange> {
    let (_, addrs) = line.rsplit_once(':')?;
    let (start, end) = addrs.split_once('-')?;
    Some(AddressRange::new(
        parse_ipv4_lenient(start)?,
        parse_ipv4_lenient(end)?,
    ))
}
