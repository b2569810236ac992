//! Conversion between stores and `KMER<whitespace>value` text
//!
//! The text form is what `jellyfish dump -c` prints, so per-sample count
//! stores can be produced from existing dumps and any store can be inspected.

use crate::constants::{low_bits_mask, DEFAULT_MAX_REPROBE};
use crate::error::{MatrixError, MatrixResult};
use crate::kmer::KmerCodec;
use crate::store::reader::StoreReader;
use crate::store::table::KmerTable;
use std::io::{BufRead, Write};
use std::path::Path;
use tracing::info;

/// Parse a k-mer/count dump into a table with `counter_len`-byte values
///
/// Blank lines and lines starting with `#` are skipped. `path` labels errors.
pub fn parse_counts<R: BufRead>(
    reader: R,
    path: &Path,
    codec: KmerCodec,
    counter_len: usize,
) -> MatrixResult<KmerTable> {
    if counter_len == 0 || counter_len > 8 {
        return Err(MatrixError::Configuration(format!(
            "counter length must be in [1, 8] bytes, got {counter_len}"
        )));
    }
    let max_count = low_bits_mask(counter_len * 8);
    let mut table = KmerTable::new(0, codec.key_bits(), counter_len * 8, 1, DEFAULT_MAX_REPROBE);

    for (i, line) in reader.lines().enumerate() {
        let line_no = i + 1;
        let line = line.map_err(|e| MatrixError::io(path, e))?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let mut fields = line.split_whitespace();
        let (Some(kmer), Some(count), None) = (fields.next(), fields.next(), fields.next()) else {
            return Err(MatrixError::format(
                path,
                format!("line {line_no}: expected `KMER COUNT`, got {line:?}"),
            ));
        };
        let key = codec
            .decode(kmer.as_bytes())
            .map_err(|source| MatrixError::Encoding {
                path: path.to_path_buf(),
                line: line_no,
                source,
            })?;
        let count: u64 = count.parse().map_err(|_| {
            MatrixError::format(path, format!("line {line_no}: invalid count {count:?}"))
        })?;
        if count > max_count {
            return Err(MatrixError::format(
                path,
                format!("line {line_no}: count {count} does not fit in {counter_len} bytes"),
            ));
        }
        if table.insert(key, count).is_some() {
            return Err(MatrixError::format(
                path,
                format!("line {line_no}: duplicate k-mer {kmer}"),
            ));
        }
    }
    Ok(table)
}

/// Import a k-mer/count dump file into a store at `output`
pub fn import_counts<P: AsRef<Path>, Q: AsRef<Path>>(
    input: P,
    output: Q,
    codec: KmerCodec,
    counter_len: usize,
) -> MatrixResult<u64> {
    let input = input.as_ref();
    let file = std::fs::File::open(input).map_err(|e| MatrixError::io(input, e))?;
    let table = parse_counts(std::io::BufReader::new(file), input, codec, counter_len)?;
    info!("Parsed {} k-mers from {}", table.len(), input.display());
    table.serialize(output)?;
    Ok(table.len() as u64)
}

/// Write every record of a store as `KMER\tvalue`, in file order
pub fn dump_store<P: AsRef<Path>, W: Write>(input: P, writer: &mut W) -> MatrixResult<u64> {
    let input = input.as_ref();
    let reader = StoreReader::open(input)?;
    let codec = KmerCodec::new(reader.header().k())?;
    let mut written = 0u64;
    for record in reader {
        let (key, value) = record?;
        writeln!(writer, "{}\t{}", codec.encode(key), value)
            .map_err(|e| MatrixError::io("<output>", e))?;
        written += 1;
    }
    Ok(written)
}
