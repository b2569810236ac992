//! Lock-step merge of per-sample count stores into a presence matrix
//!
//! All input stores must enumerate the same keys in the same order. The
//! builder advances every store by one record per step, checks that the keys
//! agree, packs one presence bit per sample (sample 0 most significant) and
//! keeps the k-mer if the number of present samples is within the configured
//! prevalence range.

use crate::error::{MatrixError, MatrixResult};
use crate::matrix::config::MatrixBuildConfig;
use crate::store::{KmerTable, StoreHeader, StoreReader};
use std::io::Read;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Records between progress messages
const PROGRESS_INTERVAL: u64 = 1 << 22;

/// Summary of one matrix build
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatrixBuildStats {
    /// K-mers read from each input
    pub kmers_scanned: u64,
    /// K-mers written to the matrix
    pub kmers_kept: u64,
    /// `prevalence[p]` = number of k-mers present in exactly `p` samples
    pub prevalence: Vec<u64>,
}

impl MatrixBuildStats {
    fn new(num_samples: usize) -> Self {
        Self {
            prevalence: vec![0; num_samples + 1],
            ..Self::default()
        }
    }

    /// Log a summary via tracing
    pub fn print_summary(&self) {
        info!("Matrix Statistics:");
        info!("  k-mers scanned = {}", self.kmers_scanned);
        info!("  k-mers kept = {}", self.kmers_kept);
        info!("  k-mers filtered = {}", self.kmers_scanned - self.kmers_kept);
        for (present, &n) in self.prevalence.iter().enumerate() {
            if n > 0 {
                debug!("  present in {} samples: {}", present, n);
            }
        }
    }
}

/// Builder for presence matrices
pub struct MatrixBuilder {
    config: MatrixBuildConfig,
}

impl MatrixBuilder {
    /// Create a builder, validating the configuration
    pub fn new(config: MatrixBuildConfig) -> MatrixResult<Self> {
        config.validate().map_err(MatrixError::Configuration)?;
        Ok(Self { config })
    }

    /// Configuration in use
    pub fn config(&self) -> &MatrixBuildConfig {
        &self.config
    }

    /// Open all inputs, merge them and write the matrix store
    ///
    /// Nothing is written to the output path unless every input merges
    /// cleanly.
    pub fn build(&self) -> MatrixResult<MatrixBuildStats> {
        self.config.print();
        let start = Instant::now();

        let mut readers = self.open_inputs()?;
        let (table, stats) = self.merge(&mut readers)?;
        drop(readers);
        if stats.kmers_kept == 0 {
            warn!("No k-mers passed the prevalence filter; writing an empty matrix");
        }

        info!("Dumping matrix to {}", self.config.output.display());
        table.serialize(&self.config.output)?;
        stats.print_summary();
        info!("Matrix built in {:.2?}", start.elapsed());
        Ok(stats)
    }

    /// Open every input and check its header against the master (first) store
    pub fn open_inputs(&self) -> MatrixResult<Vec<StoreReader>> {
        let mut readers: Vec<StoreReader> = Vec::with_capacity(self.config.num_samples());
        for path in &self.config.inputs {
            debug!("Opening {}", path.display());
            let reader = StoreReader::open(path)?;
            if let Some(master) = readers.first() {
                check_against_master(master.header(), &reader)?;
            }
            readers.push(reader);
        }
        Ok(readers)
    }

    /// Merge already-open stores into an in-memory matrix table
    ///
    /// `readers[0]` is the master: its header supplies k, the record count,
    /// the reprobe limit and the hash descriptor for the output.
    pub fn merge<R: Read>(
        &self,
        readers: &mut [StoreReader<R>],
    ) -> MatrixResult<(KmerTable, MatrixBuildStats)> {
        let num_samples = readers.len();
        if num_samples != self.config.num_samples() {
            return Err(MatrixError::Configuration(format!(
                "configured for {} samples, given {} stores",
                self.config.num_samples(),
                num_samples
            )));
        }
        let master = readers[0].header().clone();
        for reader in readers.iter().skip(1) {
            check_against_master(&master, reader)?;
        }

        let mut table = KmerTable::new(
            master.record_count,
            master.key_bit_length,
            num_samples,
            self.config.num_threads,
            master.max_reprobe,
        );
        table.set_matrix(master.matrix.clone());
        table.set_canonical(master.canonical);

        info!(
            "Iterating {} k-mers (k={}) across {} samples",
            master.record_count,
            master.k(),
            num_samples
        );
        let start = Instant::now();
        let mut stats = MatrixBuildStats::new(num_samples);

        for step in 0..master.record_count {
            let mut master_key = 0u64;
            let mut presence = 0u64;
            let mut present = 0u32;

            for (n, reader) in readers.iter_mut().enumerate() {
                let (key, count) = next_aligned_record(reader, step)?;
                if n == 0 {
                    master_key = key;
                } else if key != master_key {
                    return Err(MatrixError::format(
                        reader.path(),
                        format!(
                            "record {step}: key {key:#x} does not match master key {master_key:#x}; \
                             inputs must list the same k-mers in the same order"
                        ),
                    ));
                }

                presence <<= 1;
                if count >= self.config.abundance {
                    presence |= 1;
                    present += 1;
                }
            }

            stats.kmers_scanned += 1;
            stats.prevalence[present as usize] += 1;
            if self.config.keeps(present) {
                if table.insert(master_key, presence).is_some() {
                    return Err(MatrixError::format(
                        readers[0].path(),
                        format!("record {step}: duplicate key {master_key:#x}"),
                    ));
                }
                stats.kmers_kept += 1;
            }

            if (step + 1) % PROGRESS_INTERVAL == 0 {
                debug!("  Merged {} k-mers...", step + 1);
            }
        }

        info!("  Merged {} k-mers in {:.2?}", stats.kmers_scanned, start.elapsed());
        Ok((table, stats))
    }
}

fn check_against_master<R: Read>(master: &StoreHeader, reader: &StoreReader<R>) -> MatrixResult<()> {
    let header = reader.header();
    if header.key_bit_length != master.key_bit_length {
        return Err(MatrixError::format(
            reader.path(),
            format!(
                "k-mer length {} differs from master k-mer length {}",
                header.k(),
                master.k()
            ),
        ));
    }
    if header.record_count != master.record_count {
        return Err(MatrixError::format(
            reader.path(),
            format!(
                "record count {} differs from master record count {}",
                header.record_count, master.record_count
            ),
        ));
    }
    Ok(())
}

fn next_aligned_record<R: Read>(reader: &mut StoreReader<R>, step: u64) -> MatrixResult<(u64, u64)> {
    match reader.next() {
        Some(record) => record,
        None => Err(MatrixError::format(
            reader.path(),
            format!("ran out of records at step {step}"),
        )),
    }
}
