//! DNA nucleotide encoding
//!
//! This module implements the 2-bit encoding used for store keys. The order
//! is the lexicographic one used by jellyfish, so that numeric order of keys
//! equals lexicographic order of k-mers:
//! - A (65/97)  -> 00
//! - C (67/99)  -> 01
//! - G (71/103) -> 10
//! - T (84/116) -> 11

use thiserror::Error;

/// Error type for encoding operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EncodingError {
    /// The input byte is not a valid DNA base (A/C/G/T)
    #[error("Invalid DNA base: {:?}", base_char(.0))]
    InvalidBase(u8),
    /// The input string length does not match the expected k-mer length
    #[error("K-mer length mismatch: expected {expected}, got {actual}")]
    LengthMismatch {
        /// Expected k-mer length
        expected: usize,
        /// Actual string length
        actual: usize,
    },
}

fn base_char(base: &u8) -> char {
    *base as char
}

/// Encode a single DNA nucleotide to 2 bits (case-insensitive)
#[inline]
pub const fn encode_base(base: u8) -> Result<u8, EncodingError> {
    match base {
        b'A' | b'a' => Ok(0b00),
        b'C' | b'c' => Ok(0b01),
        b'G' | b'g' => Ok(0b10),
        b'T' | b't' => Ok(0b11),
        _ => Err(EncodingError::InvalidBase(base)),
    }
}

/// Decode a 2-bit value to DNA nucleotide (uppercase)
#[inline]
pub const fn decode_base(bits: u8) -> u8 {
    match bits & 0b11 {
        0b00 => b'A',
        0b01 => b'C',
        0b10 => b'G',
        _ => b'T',
    }
}

/// Get the complement of an encoded base
#[inline]
pub const fn complement_base(bits: u8) -> u8 {
    // A(00) <-> T(11), C(01) <-> G(10)
    bits ^ 0b11
}
