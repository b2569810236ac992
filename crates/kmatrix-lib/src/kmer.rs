//! K-mer keys with a runtime k
//!
//! Store keys are `u64` values holding `2k` bits, first base in the most
//! significant position. Unlike a compile-time k, the k-mer length here comes
//! from a store header, so it travels as an explicit [`KmerCodec`] value
//! through every component that needs it.

use crate::constants::{is_valid_k, low_bits_mask, MAX_K, MIN_K};
use crate::encoding::{decode_base, encode_base, EncodingError};
use crate::error::MatrixError;

/// Encoder/decoder for k-mers of one fixed length
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct KmerCodec {
    k: usize,
    mask: u64,
}

impl KmerCodec {
    /// Create a codec for k-mers of length `k`
    ///
    /// # Errors
    /// Returns a configuration error if `k` is outside `MIN_K..=MAX_K`.
    pub fn new(k: usize) -> Result<Self, MatrixError> {
        if !is_valid_k(k) {
            return Err(MatrixError::Configuration(format!(
                "k must be in range [{MIN_K}, {MAX_K}], got k={k}"
            )));
        }
        Ok(Self {
            k,
            mask: low_bits_mask(2 * k),
        })
    }

    /// K-mer length
    #[inline]
    pub fn k(&self) -> usize {
        self.k
    }

    /// Number of bits in a key (`2k`)
    #[inline]
    pub fn key_bits(&self) -> usize {
        2 * self.k
    }

    /// Encode an ASCII window of exactly k bases into a key (case-insensitive)
    ///
    /// # Errors
    /// Returns an error on a length mismatch or any non-ACGT symbol.
    pub fn decode(&self, window: &[u8]) -> Result<u64, EncodingError> {
        if window.len() != self.k {
            return Err(EncodingError::LengthMismatch {
                expected: self.k,
                actual: window.len(),
            });
        }
        window
            .iter()
            .try_fold(0u64, |key, &base| Ok((key << 2) | encode_base(base)? as u64))
    }

    /// Render a key back to an uppercase DNA string
    pub fn encode(&self, key: u64) -> String {
        (0..self.k)
            .rev()
            .map(|i| decode_base(((key >> (2 * i)) & 0b11) as u8) as char)
            .collect()
    }

    /// Reverse complement of a key
    ///
    /// Complement all bits, reverse the 2-bit pairs of the whole word, then
    /// drop the padding that ends up in the low bits.
    #[inline]
    pub fn reverse_complement(&self, key: u64) -> u64 {
        let mut x = !key;
        x = ((x >> 2) & 0x3333_3333_3333_3333) | ((x & 0x3333_3333_3333_3333) << 2);
        x = ((x >> 4) & 0x0F0F_0F0F_0F0F_0F0F) | ((x & 0x0F0F_0F0F_0F0F_0F0F) << 4);
        x = x.swap_bytes();
        (x >> (64 - 2 * self.k)) & self.mask
    }

    /// Canonical key: the smaller of the key and its reverse complement
    #[inline]
    pub fn canonical(&self, key: u64) -> u64 {
        key.min(self.reverse_complement(key))
    }

    /// Iterate over every window of length k in `seq`
    pub fn windows<'a>(&self, seq: &'a [u8]) -> KmerWindows<'a> {
        KmerWindows {
            codec: *self,
            seq,
            pos: 0,
            key: 0,
            valid_run: 0,
        }
    }
}

/// Rolling iterator over the k-length windows of a sequence
///
/// Yields one item per window start `0..=len-k`, in order: `Some(key)` when
/// the window holds only ACGT symbols, `None` otherwise.
pub struct KmerWindows<'a> {
    codec: KmerCodec,
    seq: &'a [u8],
    pos: usize,
    key: u64,
    valid_run: usize,
}

impl Iterator for KmerWindows<'_> {
    type Item = Option<u64>;

    fn next(&mut self) -> Option<Self::Item> {
        let k = self.codec.k;
        while self.pos < self.seq.len() {
            let base = self.seq[self.pos];
            self.pos += 1;
            match encode_base(base) {
                Ok(bits) => {
                    self.key = ((self.key << 2) | bits as u64) & self.codec.mask;
                    self.valid_run = (self.valid_run + 1).min(k);
                }
                Err(_) => self.valid_run = 0,
            }
            if self.pos >= k {
                return Some((self.valid_run >= k).then_some(self.key));
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = if self.pos < self.codec.k {
            (self.seq.len() + 1).saturating_sub(self.codec.k)
        } else {
            self.seq.len() - self.pos
        };
        (remaining, Some(remaining))
    }
}
