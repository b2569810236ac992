//! K-mer store files
//!
//! A store is a length-prefixed JSON header followed by fixed-width
//! little-endian `(key, value)` records. Per-sample count stores, matrix
//! stores and imported dumps all share this layout; only the value width
//! differs.

pub mod header;
pub mod reader;
pub mod table;
pub mod text;

pub use header::{HashMatrix, StoreHeader};
pub use reader::StoreReader;
pub use table::KmerTable;
