//! Configuration for matrix construction
//!
//! Thresholds deciding which samples count as "present" for a k-mer and which
//! k-mers survive into the matrix.

use crate::constants::MAX_SAMPLES;
use std::path::PathBuf;

/// Parameters for building a presence matrix from per-sample stores
#[derive(Debug, Clone)]
pub struct MatrixBuildConfig {
    /// Ordered per-sample count stores; index 0 is the master
    pub inputs: Vec<PathBuf>,

    /// Destination of the matrix store
    pub output: PathBuf,

    /// Counts >= this mark a sample as present
    pub abundance: u64,

    /// Keep k-mers present in at least this many samples
    pub min_prevalence: u32,

    /// Keep k-mers present in at most this many samples
    pub max_prevalence: u32,

    /// Threads for sorting the output table (0 = all available cores)
    pub num_threads: usize,
}

impl Default for MatrixBuildConfig {
    fn default() -> Self {
        Self {
            inputs: Vec::new(),
            output: PathBuf::from("matrix.jf"),
            abundance: 1,
            min_prevalence: 0,
            max_prevalence: u32::MAX,
            num_threads: 1,
        }
    }
}

impl MatrixBuildConfig {
    /// Create a configuration with default thresholds
    pub fn new(inputs: Vec<PathBuf>, output: impl Into<PathBuf>) -> Result<Self, String> {
        let config = Self {
            inputs,
            output: output.into(),
            ..Self::default()
        };
        config.validate()?;
        Ok(config)
    }

    /// Number of samples, which is also the matrix width in bits
    pub fn num_samples(&self) -> usize {
        self.inputs.len()
    }

    /// Validate the configuration parameters
    pub fn validate(&self) -> Result<(), String> {
        if self.inputs.is_empty() {
            return Err("at least one input store is required".to_string());
        }
        if self.inputs.len() > MAX_SAMPLES {
            return Err(format!(
                "at most {MAX_SAMPLES} input stores are supported, got {}",
                self.inputs.len()
            ));
        }
        if self.abundance == 0 {
            return Err("abundance threshold must be at least 1".to_string());
        }
        if self.min_prevalence > self.max_prevalence {
            return Err(format!(
                "min prevalence ({}) is greater than max prevalence ({})",
                self.min_prevalence, self.max_prevalence
            ));
        }
        if self.inputs.iter().any(|input| *input == self.output) {
            return Err(format!(
                "output {} is also an input",
                self.output.display()
            ));
        }
        Ok(())
    }

    /// Whether a k-mer present in `present` samples is kept
    #[inline]
    pub fn keeps(&self, present: u32) -> bool {
        self.min_prevalence <= present && present <= self.max_prevalence
    }

    /// Log configuration parameters via tracing
    pub fn print(&self) {
        tracing::info!("Matrix Build Configuration:");
        tracing::info!("  samples = {}", self.num_samples());
        for (i, input) in self.inputs.iter().enumerate() {
            tracing::debug!("  input[{}] = {}", i, input.display());
        }
        tracing::info!("  output = {}", self.output.display());
        tracing::info!("  abundance = {}", self.abundance);
        tracing::info!("  min_prevalence = {}", self.min_prevalence);
        if self.max_prevalence == u32::MAX {
            tracing::info!("  max_prevalence = unbounded");
        } else {
            tracing::info!("  max_prevalence = {}", self.max_prevalence);
        }
        tracing::debug!("  num_threads = {}", self.num_threads);
    }
}
