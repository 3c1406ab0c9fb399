use super::{excerpt, FormatReader};
use crate::error::DecodeError;
use crate::range::{parse_ipv4_lenient, AddressRange};
use flate2::read::GzDecoder;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Read};
use std::path::Path;

/// eMule `ipfilter.dat` inside a gzip stream.
///
/// Lines look like `001.002.003.000 - 001.002.003.255 , 000 , description`.
/// The access level column is not interpreted.
pub struct EmuleReader<R: Read> {
    inner: Option<BufReader<R>>,
    line_no: u64,
    buf: Vec<u8>,
}

impl EmuleReader<GzDecoder<File>> {
    pub fn open(path: &Path) -> io::Result<Self> {
        let file = File::open(path)?;
        Ok(Self::from_reader(GzDecoder::new(file)))
    }
}

impl<R: Read> EmuleReader<R> {
    /// Wraps an already decompressed ipfilter stream.
    pub fn from_reader(reader: R) -> Self {
        Self {
            inner: Some(BufReader::new(reader)),
            line_no: 0,
            buf: Vec::new(),
        }
    }

    fn parse(line: &str) -> Option<AddressRange> {
        // The level column must be present even though it is ignored.
        let (addrs, _level) = line.split_once(',')?;
        let (start, end) = addrs.split_once('-')?;
        Some(AddressRange::new(
            parse_ipv4_lenient(start)?,
            parse_ipv4_lenient(end)?,
        ))
    }
}

impl<R: Read + Send> FormatReader for EmuleReader<R> {
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

            return match Self::parse(line) {
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
