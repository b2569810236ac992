//! Constants and limits for kmatrix
//!
//! This module defines the compile-time limits shared by the store format,
//! the matrix builder and the histogrammer.

/// Maximum number of samples in one matrix (a presence vector is one `u64`)
pub const MAX_SAMPLES: usize = 64;

/// Maximum k-mer length (a key is one `u64`, two bits per base)
pub const MAX_K: usize = 32;

/// Minimum k-mer length
pub const MIN_K: usize = 1;

/// Number of ASCII digits that prefix the JSON header with its byte length
pub const HEADER_LENGTH_DIGITS: usize = 9;

/// Format tag written into every store header
pub const STORE_FORMAT: &str = "binary/sorted";

/// Reprobe limit written when no master header provides one
pub const DEFAULT_MAX_REPROBE: u32 = 126;

/// Counter width in bytes used by `import` unless told otherwise
pub const DEFAULT_COUNTER_LEN: usize = 4;

/// Widest matrix whose histogram is kept as a dense array (`2^(M-1)` slots)
pub const DENSE_HISTOGRAM_MAX_WIDTH: usize = 24;

/// Most entries a table reserves up front; larger tables grow as records arrive
pub const TABLE_PREALLOC_LIMIT: usize = 1 << 24;

/// Number of lines scanned per parallel batch in summary mode
pub const SUMMARY_BATCH_SIZE: usize = 16_384;

/// Version number
pub const VERSION: (u8, u8, u8) = (0, 1, 0);

/// Check if a k-mer length is supported
#[inline]
pub const fn is_valid_k(k: usize) -> bool {
    k >= MIN_K && k <= MAX_K
}

/// Number of bytes needed to hold `bits` bits, i.e. `ceil(bits / 8)`.
#[inline]
pub const fn bytes_for_bits(bits: usize) -> usize {
    bits.div_ceil(8)
}

/// Mask with the low `width` bits set (`width` in `0..=64`).
#[inline]
pub const fn low_bits_mask(width: usize) -> u64 {
    if width >= 64 {
        u64::MAX
    } else {
        (1u64 << width) - 1
    }
}
