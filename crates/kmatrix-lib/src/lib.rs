// kmatrix: multi-sample k-mer presence matrices
//
// Merges per-sample k-mer count stores into a matrix of presence bits,
// summarizes the haplotype profiles it holds and scans reads against it.

#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

pub mod constants;
pub mod encoding;
pub mod error;
pub mod kmer;
pub mod profile;
pub mod store;
pub mod matrix;
pub mod histogram;
pub mod parse;
pub mod scanner;

// Re-export common types at crate root
pub use error::{MatrixError, MatrixResult};
pub use kmer::{KmerCodec, KmerWindows};
pub use profile::ProfileSpace;
pub use store::{KmerTable, StoreHeader, StoreReader};
pub use matrix::{MatrixBuildConfig, MatrixBuildStats, MatrixBuilder};
pub use histogram::ProfileHistogram;
pub use parse::ReadFormat;
pub use scanner::{run_scan, HaplotypeScanner, LineSummary, ScanConfig, ScanMode, ScanStats};

/// Version information
pub fn version() -> (u8, u8, u8) {
    constants::VERSION
}
