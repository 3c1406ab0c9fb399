use super::FormatReader;
use crate::error::DecodeError;
use crate::range::AddressRange;
use flate2::read::GzDecoder;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Read};
use std::net::Ipv4Addr;
use std::path::Path;

const LEADER: u32 = 0xFFFF_FFFF;
const MAGIC: &[u8; 3] = b"P2B";

/// PeerGuardian binary list (P2B v1/v2) inside a gzip stream.
///
/// Each record is a NUL-terminated name followed by the start and end
/// addresses as big-endian `u32`s. Names are skipped.
pub struct P2bReader<R: Read> {
    inner: Option<BufReader<R>>,
    version: Option<u8>,
    records: u64,
}

impl P2bReader<GzDecoder<File>> {
    pub fn open(path: &Path) -> io::Result<Self> {
        let file = File::open(path)?;
        Ok(Self::from_reader(GzDecoder::new(file)))
    }
}

impl<R: Read> P2bReader<R> {
    /// Wraps an already decompressed P2B stream.
    pub fn from_reader(reader: R) -> Self {
        Self {
            inner: Some(BufReader::new(reader)),
            version: None,
            records: 0,
        }
    }

    pub fn version(&self) -> Option<u8> {
        self.version
    }

    fn read_header(reader: &mut BufReader<R>) -> Result<u8, DecodeError> {
        let mut header = [0u8; 8];
        reader
            .read_exact(&mut header)
            .map_err(|e| eof_as_truncated(e, 0))?;

        let leader = u32::from_be_bytes([header[0], header[1], header[2], header[3]]);
        if leader != LEADER {
            return Err(DecodeError::InvalidLeader(leader));
        }
        if &header[4..7] != MAGIC {
            return Err(DecodeError::InvalidMagic);
        }
        match header[7] {
            v @ (1 | 2) => Ok(v),
            v => Err(DecodeError::UnsupportedVersion(v)),
        }
    }
}

impl<R: Read + Send> FormatReader for P2bReader<R> {
    fn next_range(&mut self) -> Result<Option<AddressRange>, DecodeError> {
        let Some(reader) = self.inner.as_mut() else {
            return Ok(None);
        };

        if self.version.is_none() {
            self.version = Some(Self::read_header(reader)?);
        }

        let record = self.records + 1;
        let mut name = Vec::new();
        let n = reader.read_until(0, &mut name)?;
        if n == 0 {
            return Ok(None);
        }
        if name.last() != Some(&0) {
            return Err(DecodeError::Truncated { record });
        }

        let mut addrs = [0u8; 8];
        reader
            .read_exact(&mut addrs)
            .map_err(|e| eof_as_truncated(e, record))?;
        self.records = record;

        let start = Ipv4Addr::new(addrs[0], addrs[1], addrs[2], addrs[3]);
        let end = Ipv4Addr::new(addrs[4], addrs[5], addrs[6], addrs[7]);
        Ok(Some(AddressRange::new(start, end)))
    }

    fn close(&mut self) {
        self.inner = None;
    }
}

fn eof_as_truncated(e: io::Error, record: u64) -> DecodeError {
    if e.kind() == io::ErrorKind::UnexpectedEof {
        DecodeError::Truncated { record }
    } else {
        DecodeError::Io(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn record(name: &str, start: [u8; 4], end: [u8; 4]) -> Vec<u8> {
        let mut out = name.as_bytes().to_vec();
        out.push(0);
        out.extend_from_slice(&start);
        out.extend_from_slice(&end);
        out
    }

    fn header(version: u8) -> Vec<u8> {
        let mut out = vec![0xFF, 0xFF, 0xFF, 0xFF];
        out.extend_from_slice(b"P2B");
        out.push(version);
        out
    }

    #[test]
    fn test_reads_records_in_order() {
        let mut data = header(2);
        data.extend(record("Bad Corp", [1, 2, 3, 0], [1, 2, 3, 255]));
        data.extend(record("", [10, 0, 0, 1], [10, 0, 0, 1]));

        let mut reader = P2bReader::from_reader(Cursor::new(data));
        let first = reader.next_range().unwrap().unwrap();
        assert_eq!(reader.version(), Some(2));
        assert_eq!(first.start, Ipv4Addr::new(1, 2, 3, 0));
        assert_eq!(first.end, Ipv4Addr::new(1, 2, 3, 255));

        let second = reader.next_range().unwrap().unwrap();
        assert_eq!(second.start, Ipv4Addr::new(10, 0, 0, 1));
        assert!(reader.next_range().unwrap().is_none());
    }

    #[test]
    fn test_rejects_bad_header() {
        let mut data = header(1);
        data[0] = 0x00;
        let mut reader = P2bReader::from_reader(Cursor::new(data));
        assert!(matches!(
            reader.next_range(),
            Err(DecodeError::InvalidLeader(0x00FF_FFFF))
        ));

        let mut data = header(1);
        data[5] = b'X';
        let mut reader = P2bReader::from_reader(Cursor::new(data));
        assert!(matches!(reader.next_range(), Err(DecodeError::InvalidMagic)));

        let mut reader = P2bReader::from_reader(Cursor::new(header(3)));
        assert!(matches!(
            reader.next_range(),
            Err(DecodeError::UnsupportedVersion(3))
        ));
    }

    #[test]
    fn test_truncated_record() {
        let mut data = header(1);
        data.extend(record("ok", [1, 1, 1, 1], [1, 1, 1, 2]));
        data.extend_from_slice(b"cut\0\x02\x02");

        let mut reader = P2bReader::from_reader(Cursor::new(data));
        assert!(reader.next_range().unwrap().is_some());
        assert!(matches!(
            reader.next_range(),
            Err(DecodeError::Truncated { record: 2 })
        ));
    }

    #[test]
    fn test_close_ends_sequence() {
        let mut data = header(1);
        data.extend(record("a", [1, 1, 1, 1], [1, 1, 1, 2]));
        let mut reader = P2bReader::from_reader(Cursor::new(data));
        reader.close();
        assert!(reader.next_range().unwrap().is_none());
    }
}
