//! Error type shared by the store, builder, histogram and scanner

use crate::encoding::EncodingError;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Fatal errors raised by kmatrix operations
///
/// Decode failures on read windows and lookup misses are not errors; they are
/// skipped or tallied by the scanner.
#[derive(Error, Debug)]
pub enum MatrixError {
    /// Invalid arguments or thresholds, detected before any I/O
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A file could not be opened, read or written
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        /// Offending path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: io::Error,
    },

    /// Malformed or inconsistent store contents
    #[error("format error in {}: {message}", path.display())]
    Format {
        /// Offending path
        path: PathBuf,
        /// What was wrong
        message: String,
    },

    /// A k-mer string in textual input could not be encoded
    #[error("encoding error in {} line {line}: {source}", path.display())]
    Encoding {
        /// Offending path
        path: PathBuf,
        /// 1-based line number
        line: usize,
        /// Underlying error
        #[source]
        source: EncodingError,
    },
}

impl MatrixError {
    /// Wrap an I/O error with the path it happened on
    pub fn io(path: impl AsRef<Path>, source: io::Error) -> Self {
        MatrixError::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Build a format error for `path`
    pub fn format(path: impl AsRef<Path>, message: impl Into<String>) -> Self {
        MatrixError::Format {
            path: path.as_ref().to_path_buf(),
            message: message.into(),
        }
    }
}

/// Result type for kmatrix operations
pub type MatrixResult<T> = Result<T, MatrixError>;
