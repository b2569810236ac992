//! Sequential record reader over a store file

use crate::constants::low_bits_mask;
use crate::error::{MatrixError, MatrixResult};
use crate::store::header::StoreHeader;
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};

/// An open store: file handle, parsed header and iteration cursor
///
/// Yields exactly `header.record_count` records in file order, then stops.
/// The file is closed when the reader is dropped, including on early return
/// from an error.
pub struct StoreReader<R: Read = BufReader<File>> {
    path: PathBuf,
    header: StoreHeader,
    reader: R,
    next_record: u64,
    key_mask: u64,
    value_mask: u64,
}

impl StoreReader<BufReader<File>> {
    /// Open a store file and parse its header
    ///
    /// The records the header declares must fit in the rest of the file, so a
    /// truncated store or a corrupt record count fails here rather than
    /// mid-iteration.
    pub fn open<P: AsRef<Path>>(path: P) -> MatrixResult<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| MatrixError::io(path, e))?;
        let file_len = file.metadata().map_err(|e| MatrixError::io(path, e))?.len();

        let mut reader = BufReader::new(file);
        let (header, header_len) = StoreHeader::read_with_len(&mut reader, path)?;
        let available = file_len.saturating_sub(header_len);
        match header.data_bytes() {
            Some(needed) if needed <= available => {}
            _ => {
                return Err(MatrixError::format(
                    path,
                    format!(
                        "truncated: header declares {} records of {} bytes but only {} bytes follow",
                        header.record_count,
                        header.record_bytes(),
                        available
                    ),
                ))
            }
        }
        Ok(Self::with_header(reader, path, header))
    }
}

impl<R: Read> StoreReader<R> {
    /// Parse the header from an already-open reader; `path` labels errors
    pub fn from_reader(mut reader: R, path: impl AsRef<Path>) -> MatrixResult<Self> {
        let path = path.as_ref();
        let header = StoreHeader::read(&mut reader, path)?;
        Ok(Self::with_header(reader, path, header))
    }

    fn with_header(reader: R, path: &Path, header: StoreHeader) -> Self {
        Self {
            path: path.to_path_buf(),
            key_mask: low_bits_mask(header.key_bit_length),
            value_mask: low_bits_mask(header.value_bit_length),
            header,
            reader,
            next_record: 0,
        }
    }

    /// Parsed header
    pub fn header(&self) -> &StoreHeader {
        &self.header
    }

    /// Path the store was opened from
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of records not yet read
    pub fn remaining(&self) -> u64 {
        self.header.record_count - self.next_record
    }

    fn read_record(&mut self) -> MatrixResult<(u64, u64)> {
        let key_bytes = self.header.key_bytes();
        let mut buf = [0u8; 16];
        let record = &mut buf[..self.header.record_bytes()];
        self.reader.read_exact(record).map_err(|e| {
            if e.kind() == io::ErrorKind::UnexpectedEof {
                MatrixError::format(
                    &self.path,
                    format!(
                        "truncated: record {} of {} is incomplete",
                        self.next_record, self.header.record_count
                    ),
                )
            } else {
                MatrixError::io(&self.path, e)
            }
        })?;

        let key = le_u64(&record[..key_bytes]);
        let value = le_u64(&record[key_bytes..]);
        if key & !self.key_mask != 0 {
            return Err(MatrixError::format(
                &self.path,
                format!(
                    "record {}: key {key:#x} is wider than {} bits",
                    self.next_record, self.header.key_bit_length
                ),
            ));
        }
        if value & !self.value_mask != 0 {
            return Err(MatrixError::format(
                &self.path,
                format!(
                    "record {}: value {value} is wider than {} bits",
                    self.next_record, self.header.value_bit_length
                ),
            ));
        }
        self.next_record += 1;
        Ok((key, value))
    }
}

impl<R: Read> Iterator for StoreReader<R> {
    type Item = MatrixResult<(u64, u64)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next_record >= self.header.record_count {
            return None;
        }
        let record = self.read_record();
        if record.is_err() {
            // Stop after the first error
            self.next_record = self.header.record_count;
        }
        Some(record)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.remaining() as usize;
        (0, Some(remaining))
    }
}

/// Decode up to 8 little-endian bytes
#[inline]
pub(crate) fn le_u64(bytes: &[u8]) -> u64 {
    bytes
        .iter()
        .rev()
        .fold(0u64, |acc, &b| (acc << 8) | b as u64)
}

/// Encode the low `out.len()` bytes of `value`, little-endian
#[inline]
pub(crate) fn put_le_u64(value: u64, out: &mut [u8]) {
    for (i, byte) in out.iter_mut().enumerate() {
        *byte = (value >> (8 * i)) as u8;
    }
}
