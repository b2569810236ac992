//! Presence matrix construction
//!
//! Merges `N` per-sample count stores that enumerate the same k-mers in the
//! same order into one store whose values are `N`-bit presence vectors.

pub mod builder;
pub mod config;

pub use builder::{MatrixBuildStats, MatrixBuilder};
pub use config::MatrixBuildConfig;
