//! Frequency histogram of canonical haplotype profiles in a matrix store

use crate::constants::DENSE_HISTOGRAM_MAX_WIDTH;
use crate::error::{MatrixError, MatrixResult};
use crate::profile::ProfileSpace;
use crate::store::StoreReader;
use std::collections::BTreeMap;
use std::io::{self, Write};
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info};

#[derive(Debug, Clone)]
enum Buckets {
    /// One slot per canonical value
    Dense(Vec<u64>),
    /// Matrices too wide for `2^(M-1)` slots
    Sparse(BTreeMap<u64, u64>),
}

/// Occurrence counts per canonical profile value
#[derive(Debug, Clone)]
pub struct ProfileHistogram {
    space: ProfileSpace,
    buckets: Buckets,
    total: u64,
}

impl ProfileHistogram {
    /// Empty histogram over `space`
    pub fn new(space: ProfileSpace) -> Self {
        let buckets = if space.width() <= DENSE_HISTOGRAM_MAX_WIDTH {
            Buckets::Dense(vec![0; space.num_canonical() as usize])
        } else {
            Buckets::Sparse(BTreeMap::new())
        };
        Self {
            space,
            buckets,
            total: 0,
        }
    }

    /// Scan every record of a matrix store
    pub fn from_store<P: AsRef<Path>>(path: P) -> MatrixResult<Self> {
        let path = path.as_ref();
        let reader = StoreReader::open(path)?;
        let space = ProfileSpace::new(reader.header().value_bit_length)
            .map_err(|e| MatrixError::format(path, e.to_string()))?;
        let start = Instant::now();
        info!(
            "Iterating {} k-mers of a {}-sample matrix",
            reader.header().record_count,
            space.width()
        );

        let mut histogram = Self::new(space);
        for record in reader {
            let (_, value) = record?;
            histogram.add(value);
        }
        info!("  Done in {:.2?}", start.elapsed());
        debug!("  {} distinct canonical profiles", histogram.iter().count());
        Ok(histogram)
    }

    /// Count one raw presence vector under its canonical profile
    #[inline]
    pub fn add(&mut self, value: u64) {
        let canonical = self.space.canonical(value);
        match &mut self.buckets {
            Buckets::Dense(counts) => counts[canonical as usize] += 1,
            Buckets::Sparse(counts) => *counts.entry(canonical).or_insert(0) += 1,
        }
        self.total += 1;
    }

    /// Count for a canonical value
    pub fn count(&self, canonical: u64) -> u64 {
        match &self.buckets {
            Buckets::Dense(counts) => counts.get(canonical as usize).copied().unwrap_or(0),
            Buckets::Sparse(counts) => counts.get(&canonical).copied().unwrap_or(0),
        }
    }

    /// Number of values added
    pub fn total(&self) -> u64 {
        self.total
    }

    /// Nonzero `(canonical_value, count)` pairs in ascending value order
    pub fn iter(&self) -> Box<dyn Iterator<Item = (u64, u64)> + '_> {
        match &self.buckets {
            Buckets::Dense(counts) => Box::new(
                counts
                    .iter()
                    .enumerate()
                    .filter(|&(_, &n)| n > 0)
                    .map(|(v, &n)| (v as u64, n)),
            ),
            Buckets::Sparse(counts) => Box::new(counts.iter().map(|(&v, &n)| (v, n))),
        }
    }

    /// Write `value\tfrequency` followed by one line per nonzero bucket
    pub fn write_tsv<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        writeln!(writer, "value\tfrequency")?;
        for (value, count) in self.iter() {
            writeln!(writer, "{value}\t{count}")?;
        }
        Ok(())
    }
}
