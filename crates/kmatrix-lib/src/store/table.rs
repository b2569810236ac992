//! In-memory key→value table and its serialization back to a store file

use crate::constants::TABLE_PREALLOC_LIMIT;
use crate::error::{MatrixError, MatrixResult};
use crate::store::header::{HashMatrix, StoreHeader};
use crate::store::reader::{put_le_u64, StoreReader};
use ahash::RandomState;
use rayon::slice::ParallelSliceMut;
use std::collections::HashMap;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info};

/// Hash-backed table of k-mer keys to values
///
/// Carries the header metadata (widths, reprobe limit, hash descriptor) that
/// [`KmerTable::serialize`] writes back out.
#[derive(Debug, Clone)]
pub struct KmerTable {
    map: HashMap<u64, u64, RandomState>,
    key_bit_length: usize,
    value_bit_length: usize,
    num_threads: usize,
    max_reprobe: u32,
    canonical: bool,
    matrix: Option<HashMatrix>,
}

impl KmerTable {
    /// Create an empty table sized for `record_count` entries
    ///
    /// At most [`TABLE_PREALLOC_LIMIT`] entries are reserved up front.
    ///
    /// `num_threads` sizes the pool used when sorting records for
    /// serialization (0 = all available cores).
    pub fn new(
        record_count: u64,
        key_bit_length: usize,
        value_bit_length: usize,
        num_threads: usize,
        max_reprobe: u32,
    ) -> Self {
        Self {
            map: HashMap::with_capacity_and_hasher(
                usize::try_from(record_count)
                    .unwrap_or(usize::MAX)
                    .min(TABLE_PREALLOC_LIMIT),
                RandomState::new(),
            ),
            key_bit_length,
            value_bit_length,
            num_threads,
            max_reprobe,
            canonical: false,
            matrix: None,
        }
    }

    /// Create an empty table with the widths and metadata of `header`
    pub fn with_header(header: &StoreHeader, num_threads: usize) -> Self {
        let mut table = Self::new(
            header.record_count,
            header.key_bit_length,
            header.value_bit_length,
            num_threads,
            header.max_reprobe,
        );
        table.canonical = header.canonical;
        table.matrix = header.matrix.clone();
        table
    }

    /// Load every record of a store into a new table
    pub fn load<P: AsRef<Path>>(path: P, num_threads: usize) -> MatrixResult<Self> {
        let path = path.as_ref();
        let start = Instant::now();
        let reader = StoreReader::open(path)?;
        let mut table = Self::with_header(reader.header(), num_threads);
        info!(
            "Loading {} records from {} (k={}, value width={} bits)",
            reader.header().record_count,
            path.display(),
            reader.header().k(),
            reader.header().value_bit_length
        );
        for record in reader {
            let (key, value) = record?;
            if table.insert(key, value).is_some() {
                return Err(MatrixError::format(path, format!("duplicate key {key:#x}")));
            }
        }
        info!("  Loaded {} k-mers in {:.2?}", table.len(), start.elapsed());
        Ok(table)
    }

    /// Insert a record, returning the previous value for `key` if any
    #[inline]
    pub fn insert(&mut self, key: u64, value: u64) -> Option<u64> {
        self.map.insert(key, value)
    }

    /// Look up a key
    #[inline]
    pub fn get(&self, key: u64) -> Option<u64> {
        self.map.get(&key).copied()
    }

    /// Number of stored records
    #[inline]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Whether the table is empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// K-mer length
    pub fn k(&self) -> usize {
        self.key_bit_length / 2
    }

    /// Key width in bits
    pub fn key_bit_length(&self) -> usize {
        self.key_bit_length
    }

    /// Value width in bits
    pub fn value_bit_length(&self) -> usize {
        self.value_bit_length
    }

    /// Set the hash descriptor written into the header
    pub fn set_matrix(&mut self, matrix: Option<HashMatrix>) {
        self.matrix = matrix;
    }

    /// Mark keys as canonical in the written header
    pub fn set_canonical(&mut self, canonical: bool) {
        self.canonical = canonical;
    }

    /// Header describing the table as it would be serialized now
    pub fn header(&self) -> StoreHeader {
        let mut header =
            StoreHeader::new(self.key_bit_length, self.value_bit_length, self.map.len() as u64);
        header.max_reprobe = self.max_reprobe;
        header.canonical = self.canonical;
        header.matrix = self.matrix.clone();
        header
    }

    /// Records sorted by key
    pub fn sorted_records(&self) -> MatrixResult<Vec<(u64, u64)>> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.num_threads)
            .build()
            .map_err(|e| MatrixError::Configuration(format!("failed to create thread pool: {e}")))?;

        let mut records: Vec<(u64, u64)> = self.map.iter().map(|(&k, &v)| (k, v)).collect();
        pool.install(|| records.par_sort_unstable_by_key(|&(key, _)| key));
        Ok(records)
    }

    /// Write the table to `path` as a store file, records sorted by key
    ///
    /// The file is written next to the destination under a temporary name and
    /// renamed into place once complete, so a failure leaves no partial output
    /// and an existing file at `path` is replaced only on success.
    pub fn serialize<P: AsRef<Path>>(&self, path: P) -> MatrixResult<()> {
        let path = path.as_ref();
        let start = Instant::now();
        let header = self.header();
        header
            .validate()
            .map_err(|message| MatrixError::format(path, message))?;

        let records = self.sorted_records()?;
        debug!("  Sorted {} records in {:.2?}", records.len(), start.elapsed());

        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| MatrixError::io(path, e))?;
        {
            let mut writer = BufWriter::new(tmp.as_file());
            header
                .write(&mut writer)
                .map_err(|e| MatrixError::io(path, e))?;

            let key_bytes = header.key_bytes();
            let mut record = vec![0u8; header.record_bytes()];
            for &(key, value) in &records {
                put_le_u64(key, &mut record[..key_bytes]);
                put_le_u64(value, &mut record[key_bytes..]);
                writer
                    .write_all(&record)
                    .map_err(|e| MatrixError::io(path, e))?;
            }
            writer.flush().map_err(|e| MatrixError::io(path, e))?;
        }
        tmp.persist(path).map_err(|e| MatrixError::io(path, e.error))?;

        info!(
            "Wrote {} records to {} in {:.2?}",
            records.len(),
            path.display(),
            start.elapsed()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_insert_and_get() {
        let mut table = KmerTable::new(4, 10, 3, 1, 126);
        assert!(table.is_empty());
        assert_eq!(table.insert(7, 0b101), None);
        assert_eq!(table.insert(9, 0b011), None);
        assert_eq!(table.insert(7, 0b111), Some(0b101));

        assert_eq!(table.len(), 2);
        assert_eq!(table.get(7), Some(0b111));
        assert_eq!(table.get(9), Some(0b011));
        assert_eq!(table.get(8), None);
        assert_eq!(table.k(), 5);
    }

    #[test]
    fn test_serialize_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("matrix.jf");

        let mut table = KmerTable::new(3, 42, 10, 2, 62);
        table.set_matrix(Some(HashMatrix {
            r: 20,
            c: 42,
            identity: false,
            columns: vec![11, 13],
        }));
        table.insert(300, 0b10_0000_0001);
        table.insert(5, 0b00_0000_0011);
        table.insert(1 << 41, 0);
        table.serialize(&path).unwrap();

        let reader = StoreReader::open(&path).unwrap();
        let header = reader.header().clone();
        assert_eq!(header.record_count, 3);
        assert_eq!(header.counter_len, 2);
        assert_eq!(header.value_bit_length, 10);
        assert_eq!(header.max_reprobe, 62);
        assert_eq!(header.matrix.as_ref().unwrap().columns, vec![11, 13]);

        let keys: Vec<u64> = reader.map(|r| r.unwrap().0).collect();
        assert_eq!(keys, vec![5, 300, 1 << 41]);

        let loaded = KmerTable::load(&path, 1).unwrap();
        assert_eq!(loaded.len(), 3);
        assert_eq!(loaded.get(300), Some(0b10_0000_0001));
        assert_eq!(loaded.get(1 << 41), Some(0));
        assert_eq!(loaded.header().matrix, header.matrix);
    }

    #[test]
    fn test_serialize_overwrites_destination() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.jf");
        std::fs::write(&path, b"stale contents").unwrap();

        let mut table = KmerTable::new(1, 4, 1, 1, 126);
        table.insert(3, 1);
        table.serialize(&path).unwrap();

        let loaded = KmerTable::load(&path, 1).unwrap();
        assert_eq!(loaded.get(3), Some(1));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_declared_count_does_not_drive_allocation() {
        let mut table = KmerTable::new(1 << 62, 10, 2, 1, 126);
        table.insert(1, 2);
        assert_eq!(table.get(1), Some(2));
    }

    #[test]
    fn test_load_corrupt_record_count() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("corrupt.jf");
        let mut bytes = Vec::new();
        StoreHeader::new(10, 2, 1 << 62).write(&mut bytes).unwrap();
        std::fs::write(&path, bytes).unwrap();

        let err = KmerTable::load(&path, 1).unwrap_err();
        assert!(matches!(err, MatrixError::Format { .. }));
    }

    #[test]
    fn test_serialize_unwritable_destination() {
        let table = KmerTable::new(0, 4, 1, 1, 126);
        let err = table.serialize("/nonexistent/dir/out.jf").unwrap_err();
        assert!(matches!(err, MatrixError::Io { .. }));
    }
}
