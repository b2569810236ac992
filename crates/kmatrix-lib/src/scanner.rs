//! Read haplotype scanner
//!
//! Loads a matrix store into memory and looks up the k-mers of reads in it.
//! Two modes are supported:
//!
//! - [`ScanMode::Enumerate`]: for each FASTA/FASTQ read, print the presence
//!   vectors of its canonical k-mers in window order.
//! - [`ScanMode::Summary`]: for each raw input line, count the distinct
//!   presence vectors hit and the windows that missed. Keys are looked up as
//!   read, without canonicalization, over the first `len - k` windows.

use crate::constants::SUMMARY_BATCH_SIZE;
use crate::error::MatrixResult;
use crate::kmer::KmerCodec;
use crate::parse::{parse_reads, ReadFormat};
use crate::store::KmerTable;
use ahash::RandomState;
use anyhow::{Context, Result};
use rayon::prelude::*;
use std::collections::HashSet;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info};

/// What to scan and how to report it
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanMode {
    /// Per-read list of found presence vectors (canonical lookups)
    Enumerate {
        /// FASTA/FASTQ file of reads
        reads: PathBuf,
        /// Layout the file was declared as
        format: ReadFormat,
    },
    /// Per-line `distinct\tnot_found` over raw lines (non-canonical lookups)
    Summary,
}

/// Parameters for a scan
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// Matrix store to load
    pub matrix: PathBuf,
    /// Scan mode
    pub mode: ScanMode,
    /// Threads for summary batches
    pub num_threads: usize,
    /// Lines per summary batch
    pub batch_size: usize,
}

impl ScanConfig {
    /// Create a configuration with one thread and the default batch size
    pub fn new(matrix: impl Into<PathBuf>, mode: ScanMode) -> Self {
        Self {
            matrix: matrix.into(),
            mode,
            num_threads: 1,
            batch_size: SUMMARY_BATCH_SIZE,
        }
    }

    /// Validate the configuration parameters
    pub fn validate(&self) -> Result<(), String> {
        if self.num_threads == 0 {
            return Err("thread count must be at least 1".to_string());
        }
        if self.batch_size == 0 {
            return Err("batch size must be at least 1".to_string());
        }
        Ok(())
    }

    /// Log configuration parameters via tracing
    pub fn print(&self) {
        info!("Scan Configuration:");
        info!("  matrix = {}", self.matrix.display());
        match &self.mode {
            ScanMode::Enumerate { reads, format } => {
                info!("  mode = enumerate");
                info!("  reads = {} ({})", reads.display(), format);
            }
            ScanMode::Summary => {
                info!("  mode = summary");
                info!("  num_threads = {}", self.num_threads);
                debug!("  batch_size = {}", self.batch_size);
            }
        }
    }
}

/// Per-line result of a summary scan
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LineSummary {
    /// Distinct presence vectors among found windows
    pub distinct: usize,
    /// Windows that were undecodable or absent from the matrix
    pub not_found: usize,
    /// Windows examined (`len - k`, or 0)
    pub windows: usize,
}

impl LineSummary {
    /// Windows that hit the matrix
    pub fn found(&self) -> usize {
        self.windows - self.not_found
    }
}

/// Totals over one scan
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanStats {
    /// Reads or lines processed
    pub records: u64,
    /// Windows examined
    pub windows: u64,
    /// Windows that hit the matrix
    pub found: u64,
}

impl ScanStats {
    /// Log a summary via tracing
    pub fn print_summary(&self) {
        info!("Scan Statistics:");
        info!("  records = {}", self.records);
        info!("  windows = {}", self.windows);
        info!("  found = {}", self.found);
        if self.windows > 0 {
            info!(
                "  hit rate = {:.2}%",
                self.found as f64 / self.windows as f64 * 100.0
            );
        }
    }
}

/// A matrix loaded for lookups, with the codec for its k
pub struct HaplotypeScanner {
    table: KmerTable,
    codec: KmerCodec,
}

impl HaplotypeScanner {
    /// Wrap an already-loaded matrix table
    pub fn new(table: KmerTable) -> MatrixResult<Self> {
        let codec = KmerCodec::new(table.k())?;
        Ok(Self { table, codec })
    }

    /// Load a matrix store
    pub fn load<P: AsRef<Path>>(path: P) -> MatrixResult<Self> {
        Self::new(KmerTable::load(path, 1)?)
    }

    /// Codec for the matrix's k
    pub fn codec(&self) -> KmerCodec {
        self.codec
    }

    /// Matrix width in bits
    pub fn width(&self) -> usize {
        self.table.value_bit_length()
    }

    /// Presence vectors of the canonical k-mers of `seq`, in window order
    ///
    /// Undecodable windows and k-mers absent from the matrix are skipped.
    pub fn enumerate_read(&self, seq: &[u8]) -> Vec<u64> {
        self.codec
            .windows(seq)
            .flatten()
            .filter_map(|key| self.table.get(self.codec.canonical(key)))
            .collect()
    }

    /// Distinct hits and misses over the first `len - k` windows of `line`
    pub fn summarize_line(&self, line: &[u8]) -> LineSummary {
        let windows = line.len().saturating_sub(self.codec.k());
        let mut values: HashSet<u64, RandomState> = HashSet::default();
        let mut not_found = 0;

        for window in self.codec.windows(line).take(windows) {
            match window.and_then(|key| self.table.get(key)) {
                Some(value) => {
                    values.insert(value);
                }
                None => not_found += 1,
            }
        }

        LineSummary {
            distinct: values.len(),
            not_found,
            windows,
        }
    }

    /// Enumerate every read of a FASTA/FASTQ file
    ///
    /// Writes the read's header line (with its `>`/`@` marker) on one line,
    /// then each found value followed by a tab on the next. Every record must
    /// be in `format`.
    pub fn write_enumeration<P: AsRef<Path>, W: Write>(
        &self,
        reads: P,
        format: ReadFormat,
        writer: &mut W,
    ) -> Result<ScanStats> {
        let reads = reads.as_ref();
        let mut stats = ScanStats::default();
        let k = self.codec.k();

        parse_reads(reads, format, |id, seq| {
            let values = self.enumerate_read(seq);
            stats.records += 1;
            stats.windows += (seq.len() + 1).saturating_sub(k) as u64;
            stats.found += values.len() as u64;

            writer.write_all(&[format.marker()])?;
            writer.write_all(id)?;
            writer.write_all(b"\n")?;
            for value in &values {
                write!(writer, "{value}\t")?;
            }
            writer.write_all(b"\n")?;
            Ok(())
        })?;

        Ok(stats)
    }

    /// Summarize every line of `input`
    ///
    /// Lines are read in batches of `batch_size`, each batch is scanned on a
    /// pool of `num_threads` workers, and results are written in input order.
    pub fn write_summaries<R: BufRead, W: Write>(
        &self,
        mut input: R,
        writer: &mut W,
        num_threads: usize,
        batch_size: usize,
    ) -> Result<ScanStats> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .build()
            .context("Failed to create thread pool")?;

        let mut stats = ScanStats::default();
        let mut batch: Vec<Vec<u8>> = Vec::with_capacity(batch_size);
        loop {
            let exhausted = fill_batch(&mut input, &mut batch, batch_size)?;
            if !batch.is_empty() {
                let summaries: Vec<LineSummary> = pool.install(|| {
                    batch
                        .par_iter()
                        .map(|line| self.summarize_line(line))
                        .collect()
                });
                for summary in &summaries {
                    writeln!(writer, "{}\t{}", summary.distinct, summary.not_found)?;
                    stats.windows += summary.windows as u64;
                    stats.found += summary.found() as u64;
                }
                stats.records += summaries.len() as u64;
                debug!("  Summarized {} lines...", stats.records);
            }
            if exhausted {
                break;
            }
        }

        Ok(stats)
    }
}

/// Read up to `batch_size` lines into `batch`, without line terminators
///
/// Returns `true` once the input is exhausted.
fn fill_batch<R: BufRead>(input: &mut R, batch: &mut Vec<Vec<u8>>, batch_size: usize) -> Result<bool> {
    batch.clear();
    while batch.len() < batch_size {
        let mut line = Vec::new();
        if input.read_until(b'\n', &mut line).context("Failed to read input line")? == 0 {
            return Ok(true);
        }
        if line.last() == Some(&b'\n') {
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
        }
        batch.push(line);
    }
    Ok(false)
}

/// Load the matrix named in `config` and run the configured scan
///
/// `input` is only consumed in summary mode.
pub fn run_scan<R: BufRead, W: Write>(config: &ScanConfig, input: R, writer: &mut W) -> Result<ScanStats> {
    config.validate().map_err(anyhow::Error::msg)?;
    config.print();

    let scanner = HaplotypeScanner::load(&config.matrix)
        .with_context(|| format!("Failed to load matrix {}", config.matrix.display()))?;
    info!(
        "Matrix loaded (k={}, {} samples)",
        scanner.codec().k(),
        scanner.width()
    );

    let start = Instant::now();
    let stats = match &config.mode {
        ScanMode::Enumerate { reads, format } => {
            scanner.write_enumeration(reads, *format, writer)?
        }
        ScanMode::Summary => {
            scanner.write_summaries(input, writer, config.num_threads, config.batch_size)?
        }
    };
    writer.flush().context("Failed to flush output")?;

    stats.print_summary();
    info!("Scan finished in {:.2?}", start.elapsed());
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;

    // k = 3 matrix over 2 samples
    fn scanner(entries: &[(&str, u64)]) -> HaplotypeScanner {
        let codec = KmerCodec::new(3).unwrap();
        let mut table = KmerTable::new(entries.len() as u64, 6, 2, 1, 126);
        for &(kmer, value) in entries {
            table.insert(codec.decode(kmer.as_bytes()).unwrap(), value);
        }
        HaplotypeScanner::new(table).unwrap()
    }

    #[test]
    fn test_enumerate_canonicalizes_and_skips() {
        // ACG and CGT are each other's reverse complement; ACG is canonical
        let s = scanner(&[("ACG", 0b01), ("AAA", 0b11)]);
        // windows: ACG, CGT, GTN(skip), TNA(skip), NAA(skip), AAA, AAC(miss)
        let values = s.enumerate_read(b"ACGTNAAAC");
        assert_eq!(values, vec![0b01, 0b01, 0b11]);
    }

    #[test]
    fn test_enumerate_finds_reverse_strand() {
        let s = scanner(&[("AAA", 0b10)]);
        assert_eq!(s.enumerate_read(b"TTT"), vec![0b10]);
        assert_eq!(s.enumerate_read(b"ttt"), vec![0b10]);
    }

    #[test]
    fn test_enumerate_short_read() {
        let s = scanner(&[("AAA", 0b10)]);
        assert!(s.enumerate_read(b"AA").is_empty());
        assert!(s.enumerate_read(b"").is_empty());
    }

    #[test]
    fn test_summary_excludes_last_window() {
        let s = scanner(&[("ACG", 0b01), ("CGT", 0b10), ("GTA", 0b10)]);
        // len 6, k 3: windows ACG, CGT, GTA; TAC is not examined
        let summary = s.summarize_line(b"ACGTAC");
        assert_eq!(summary.windows, 3);
        assert_eq!(summary.not_found, 0);
        assert_eq!(summary.distinct, 2);
    }

    #[test]
    fn test_summary_does_not_canonicalize() {
        let s = scanner(&[("AAA", 0b10)]);
        let summary = s.summarize_line(b"TTTT");
        assert_eq!(summary.windows, 1);
        assert_eq!(summary.not_found, 1);
        assert_eq!(summary.distinct, 0);
    }

    #[test]
    fn test_summary_counts_invalid_windows_as_missing() {
        let s = scanner(&[("AAA", 0b10)]);
        let summary = s.summarize_line(b"AAANAAAA");
        // windows AAA, AAN, ANA, NAA, AAA
        assert_eq!(summary.windows, 5);
        assert_eq!(summary.not_found, 3);
        assert_eq!(summary.found(), 2);
        assert_eq!(summary.distinct, 1);
    }

    #[test]
    fn test_summary_short_lines() {
        let s = scanner(&[("AAA", 0b10)]);
        assert_eq!(s.summarize_line(b"AAA"), LineSummary::default());
        assert_eq!(s.summarize_line(b""), LineSummary::default());
    }

    #[test]
    fn test_write_summaries_keeps_input_order() {
        let s = scanner(&[("AAA", 0b10), ("CCC", 0b01)]);
        let input = b"AAAA\nCCCCC\r\nGG\nAAACCCC\n".as_slice();
        let mut out = Vec::new();
        let stats = s.write_summaries(input, &mut out, 2, 2).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "1\t0\n1\t0\n0\t0\n2\t2\n"
        );
        assert_eq!(stats.records, 4);
        assert_eq!(stats.windows, 1 + 2 + 0 + 4);
        assert_eq!(stats.found, 1 + 2 + 0 + 2);
    }

    #[test]
    fn test_write_summaries_without_trailing_newline() {
        let s = scanner(&[("AAA", 0b10)]);
        let mut out = Vec::new();
        s.write_summaries(b"AAAA".as_slice(), &mut out, 1, 16).unwrap();
        assert_eq!(out, b"1\t0\n");
    }

    #[test]
    fn test_load_corrupt_record_count() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("matrix.jf");
        let mut bytes = Vec::new();
        crate::store::StoreHeader::new(10, 2, 1 << 62)
            .write(&mut bytes)
            .unwrap();
        std::fs::write(&path, bytes).unwrap();

        let err = HaplotypeScanner::load(&path).err().unwrap();
        assert!(matches!(err, crate::error::MatrixError::Format { .. }));
    }

    #[test]
    fn test_write_enumeration_keeps_header_marker() {
        let dir = tempfile::TempDir::new().unwrap();
        let reads = dir.path().join("reads.fq");
        std::fs::write(&reads, "@r1 lane=2\nAAAAC\n+\nIIIII\n").unwrap();

        let s = scanner(&[("AAA", 0b10)]);
        let mut out = Vec::new();
        let stats = s.write_enumeration(&reads, ReadFormat::Fastq, &mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "@r1 lane=2\n2\t2\t\n");
        assert_eq!(stats.found, 2);
    }

    #[test]
    fn test_write_enumeration_rejects_wrong_format() {
        let dir = tempfile::TempDir::new().unwrap();
        let reads = dir.path().join("reads.fq");
        std::fs::write(&reads, "@r1\nAAAAC\n+\nIIIII\n").unwrap();

        let s = scanner(&[("AAA", 0b10)]);
        let mut out = Vec::new();
        let err = s
            .write_enumeration(&reads, ReadFormat::Fasta, &mut out)
            .unwrap_err();
        assert!(err.to_string().contains("is not FASTA"));
        assert!(out.is_empty());
    }

    #[test]
    fn test_config_validate() {
        let mut config = ScanConfig::new("m.jf", ScanMode::Summary);
        assert!(config.validate().is_ok());
        config.num_threads = 0;
        assert!(config.validate().is_err());
    }
}
