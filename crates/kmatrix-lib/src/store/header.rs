//! Store header: a length-prefixed JSON document
//!
//! # File Format
//!
//! ```text
//! 000000183                      9 ASCII digits: byte length L of the JSON header
//! {"format":"binary/sorted",...} L bytes of JSON (see StoreHeader)
//! key | value                    `size` records, little-endian,
//! key | value                    ceil(key_len / 8) + counter_len bytes each
//! ...
//! ```
//!
//! Field names follow jellyfish: `key_len` and `val_len` are bit widths,
//! `counter_len` is the on-disk value width in bytes and `size` is the number
//! of records that follow the header.

use crate::constants::{bytes_for_bits, DEFAULT_MAX_REPROBE, HEADER_LENGTH_DIGITS, STORE_FORMAT};
use crate::error::{MatrixError, MatrixResult};
use serde::{Deserialize, Serialize};
use std::io::{self, Read, Write};
use std::path::Path;

/// Hash-function descriptor carried through from count stores
///
/// It has no meaning for the in-memory table here; it is preserved so a
/// matrix built from jellyfish-derived stores records how they were hashed.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct HashMatrix {
    /// Rows
    pub r: u32,
    /// Columns
    pub c: u32,
    /// Whether the matrix is the identity
    #[serde(default)]
    pub identity: bool,
    /// Column bit patterns
    #[serde(default)]
    pub columns: Vec<u64>,
}

fn default_max_reprobe() -> u32 {
    DEFAULT_MAX_REPROBE
}

/// Metadata at the start of every store file
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct StoreHeader {
    /// Format tag ("binary/sorted")
    pub format: String,
    /// Key width in bits (`2k`)
    #[serde(rename = "key_len")]
    pub key_bit_length: usize,
    /// Value width in bits (`M` for a matrix store)
    #[serde(rename = "val_len")]
    pub value_bit_length: usize,
    /// On-disk value width in bytes
    pub counter_len: usize,
    /// Number of records following the header
    #[serde(rename = "size")]
    pub record_count: u64,
    /// Reprobe limit of the table the store was dumped from
    #[serde(default = "default_max_reprobe")]
    pub max_reprobe: u32,
    /// Whether keys were canonicalized when counted
    #[serde(default)]
    pub canonical: bool,
    /// Hash-function descriptor
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matrix: Option<HashMatrix>,
}

impl StoreHeader {
    /// Create a header for `record_count` records of the given widths
    pub fn new(key_bit_length: usize, value_bit_length: usize, record_count: u64) -> Self {
        Self {
            format: STORE_FORMAT.to_string(),
            key_bit_length,
            value_bit_length,
            counter_len: bytes_for_bits(value_bit_length),
            record_count,
            max_reprobe: DEFAULT_MAX_REPROBE,
            canonical: false,
            matrix: None,
        }
    }

    /// K-mer length
    #[inline]
    pub fn k(&self) -> usize {
        self.key_bit_length / 2
    }

    /// On-disk key width in bytes
    #[inline]
    pub fn key_bytes(&self) -> usize {
        bytes_for_bits(self.key_bit_length)
    }

    /// On-disk size of one record in bytes
    #[inline]
    pub fn record_bytes(&self) -> usize {
        self.key_bytes() + self.counter_len
    }

    /// Check that the widths describe records this crate can read
    pub fn validate(&self) -> Result<(), String> {
        if self.format != STORE_FORMAT {
            return Err(format!(
                "unsupported format {:?}, expected {:?}",
                self.format, STORE_FORMAT
            ));
        }
        if self.key_bit_length == 0 || self.key_bit_length > 64 || self.key_bit_length % 2 != 0 {
            return Err(format!(
                "key_len must be an even number of bits in [2, 64], got {}",
                self.key_bit_length
            ));
        }
        if self.value_bit_length == 0 || self.value_bit_length > 64 {
            return Err(format!(
                "val_len must be in [1, 64] bits, got {}",
                self.value_bit_length
            ));
        }
        if self.counter_len == 0 || self.counter_len > 8 {
            return Err(format!("counter_len must be in [1, 8] bytes, got {}", self.counter_len));
        }
        if self.counter_len * 8 < self.value_bit_length {
            return Err(format!(
                "counter_len of {} bytes cannot hold val_len of {} bits",
                self.counter_len, self.value_bit_length
            ));
        }
        Ok(())
    }

    /// Write the length prefix and JSON document
    pub fn write<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        let json = serde_json::to_vec(self).map_err(io::Error::other)?;
        if json.len() >= 10usize.pow(HEADER_LENGTH_DIGITS as u32) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "store header too large for its length prefix",
            ));
        }
        write!(writer, "{:0width$}", json.len(), width = HEADER_LENGTH_DIGITS)?;
        writer.write_all(&json)?;
        Ok(())
    }

    /// Read and validate a header; `path` only labels errors
    pub fn read<R: Read>(reader: &mut R, path: &Path) -> MatrixResult<Self> {
        Self::read_with_len(reader, path).map(|(header, _)| header)
    }

    /// Read and validate a header, also returning its size in bytes on disk
    pub fn read_with_len<R: Read>(reader: &mut R, path: &Path) -> MatrixResult<(Self, u64)> {
        let mut prefix = [0u8; HEADER_LENGTH_DIGITS];
        read_header_bytes(reader, &mut prefix, path)?;

        let len: usize = std::str::from_utf8(&prefix)
            .ok()
            .filter(|s| s.bytes().all(|b| b.is_ascii_digit()))
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| {
                MatrixError::format(path, "missing header length prefix (not a k-mer store?)")
            })?;

        // Grow with the data actually present rather than trusting the prefix
        let mut json = Vec::new();
        reader
            .by_ref()
            .take(len as u64)
            .read_to_end(&mut json)
            .map_err(|e| MatrixError::io(path, e))?;
        if json.len() < len {
            return Err(MatrixError::format(path, "truncated header"));
        }

        let header: StoreHeader = serde_json::from_slice(&json)
            .map_err(|e| MatrixError::format(path, format!("malformed header: {e}")))?;
        header
            .validate()
            .map_err(|message| MatrixError::format(path, message))?;
        Ok((header, (HEADER_LENGTH_DIGITS + len) as u64))
    }

    /// Bytes occupied by the declared records, or `None` on overflow
    pub fn data_bytes(&self) -> Option<u64> {
        self.record_count.checked_mul(self.record_bytes() as u64)
    }
}

fn read_header_bytes<R: Read>(reader: &mut R, buf: &mut [u8], path: &Path) -> MatrixResult<()> {
    reader.read_exact(buf).map_err(|e| {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            MatrixError::format(path, "truncated header")
        } else {
            MatrixError::io(path, e)
        }
    })
}
