//! Presence vectors and their canonical profile values
//!
//! A presence vector of width `M` and its bit-complement describe the same
//! haplotype split seen from opposite polarities. The canonical
//! representative is the one whose most significant bit (sample 0) is clear.

use crate::constants::{low_bits_mask, MAX_SAMPLES};
use crate::error::{MatrixError, MatrixResult};

/// Value space of `M`-bit presence vectors
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProfileSpace {
    width: usize,
    mask: u64,
    msb: u64,
}

impl ProfileSpace {
    /// Create the space of `width`-bit profiles (`1..=64`)
    pub fn new(width: usize) -> MatrixResult<Self> {
        if width == 0 || width > MAX_SAMPLES {
            return Err(MatrixError::Configuration(format!(
                "matrix width must be in [1, {MAX_SAMPLES}] bits, got {width}"
            )));
        }
        Ok(Self {
            width,
            mask: low_bits_mask(width),
            msb: 1u64 << (width - 1),
        })
    }

    /// Width `M` in bits
    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    /// All `M` low bits set
    #[inline]
    pub fn mask(&self) -> u64 {
        self.mask
    }

    /// Number of canonical values, `2^(M-1)`
    #[inline]
    pub fn num_canonical(&self) -> u64 {
        self.msb
    }

    /// Bit-complement within the `M`-bit space
    #[inline]
    pub fn complement(&self, value: u64) -> u64 {
        !value & self.mask
    }

    /// Whether `value` already has its most significant bit clear
    #[inline]
    pub fn is_canonical(&self, value: u64) -> bool {
        value & self.msb == 0
    }

    /// Fold a profile onto its canonical representative
    #[inline]
    pub fn canonical(&self, value: u64) -> u64 {
        if self.is_canonical(value) {
            value
        } else {
            self.complement(value)
        }
    }
}
