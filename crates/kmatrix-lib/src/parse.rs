//! FASTA/FASTQ read parsing with automatic decompression
//!
//! Unlike sequence input for index construction, reads are not validated
//! against the DNA alphabet here: windows holding `N` or other symbols are
//! skipped one at a time by the scanner.

use anyhow::{Context, Result};
use needletail::parse_fastx_file;
use needletail::parser::Format;
use std::fs;
use std::path::Path;

/// Record layout a read file is expected to use
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReadFormat {
    /// `>id` header followed by sequence lines
    Fasta,
    /// Four-line `@id` records with qualities
    Fastq,
}

impl ReadFormat {
    /// Character that opens a record header
    pub fn marker(&self) -> u8 {
        match self {
            ReadFormat::Fasta => b'>',
            ReadFormat::Fastq => b'@',
        }
    }

    fn matches(&self, format: Format) -> bool {
        matches!(
            (self, format),
            (ReadFormat::Fasta, Format::Fasta) | (ReadFormat::Fastq, Format::Fastq)
        )
    }
}

impl std::fmt::Display for ReadFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReadFormat::Fasta => write!(f, "FASTA"),
            ReadFormat::Fastq => write!(f, "FASTQ"),
        }
    }
}

/// Parse a FASTA/FASTQ file and call a function for each read
///
/// The callback receives `(id, sequence)`, where `id` is the header line
/// without its leading `>`/`@`. An empty file yields no reads.
///
/// # Errors
/// Returns error if the file cannot be opened, a record is malformed or a
/// record is not in the `expected` format.
pub fn parse_reads<P, F>(path: P, expected: ReadFormat, mut callback: F) -> Result<()>
where
    P: AsRef<Path>,
    F: FnMut(&[u8], &[u8]) -> Result<()>,
{
    let path = path.as_ref();

    // needletail refuses empty input, but an empty read set is valid here
    let metadata = fs::metadata(path)
        .with_context(|| format!("Failed to open read file: {}", path.display()))?;
    if metadata.len() == 0 {
        return Ok(());
    }

    let mut reader = parse_fastx_file(path)
        .with_context(|| format!("Failed to open read file: {}", path.display()))?;

    while let Some(record) = reader.next() {
        let record = record
            .with_context(|| format!("Failed to parse read record in {}", path.display()))?;
        if !expected.matches(record.format()) {
            anyhow::bail!(
                "{} is not {}: found a record starting with '{}'",
                path.display(),
                expected,
                record.format().start_char()
            );
        }
        let seq = record.seq();
        callback(record.id(), &seq)?;
    }

    Ok(())
}
