//! Error types for sampling, batch runs, and input loading.

use std::io;

use thiserror::Error;

/// Failure of a single sampler call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SamplingError {
    /// `Q < N` or `N < 1`: no partition into `N` positive parts exists.
    #[error("invalid combination: Q={q}, N={n} (need Q >= N >= 1)")]
    InvalidCombination { q: u64, n: u64 },
    /// The partition counting table for `(Q, N)` would exceed its cell limit.
    #[error("combination too large: Q={q}, N={n} needs {cells} table cells")]
    CombinationTooLarge { q: u64, n: u64, cells: u64 },
    /// A produced draw does not have `N` parts summing to `Q`.
    #[error("sampling invariant violated for Q={q}, N={n}: draw has {len} parts summing to {sum}")]
    InvariantViolation { q: u64, n: u64, len: usize, sum: u64 },
}

impl SamplingError {
    /// Whether the error must abort the whole run rather than one study.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::InvariantViolation { .. })
    }
}

/// Conditions that stop a batch run of many studies.
#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Sampling(#[from] SamplingError),
    #[error("output sink failed: {0}")]
    Sink(#[from] io::Error),
}

/// Failure reading an input data file.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("line {line}: {reason}")]
    Parse { line: usize, reason: String },
}
