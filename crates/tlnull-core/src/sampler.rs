//! Sampler capability shared by the partition and composition engines.
//!
//! Every feasible-set sampler implements [`CombinatorialSampler`]. A draw is
//! always returned in canonical form: `N` integers summing to `Q`, sorted
//! descending. Callers must not depend on part order beyond that.

use std::str::FromStr;

use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::composition::CompositionSampler;
use crate::error::SamplingError;
use crate::partition::PartitionSampler;

/// Which feasible set the null distribution is drawn from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisMode {
    /// Unordered integer partitions of `Q` into exactly `N` positive parts.
    #[default]
    Partition,
    /// Ordered weak compositions of `Q` into `N` non-negative parts.
    Composition,
}

impl std::fmt::Display for AnalysisMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Partition => write!(f, "partition"),
            Self::Composition => write!(f, "composition"),
        }
    }
}

impl FromStr for AnalysisMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "partition" | "partitions" => Ok(Self::Partition),
            "composition" | "compositions" => Ok(Self::Composition),
            other => Err(format!(
                "unknown analysis mode '{other}' (expected partition or composition)"
            )),
        }
    }
}

/// A source of uniformly random feasible-set draws for fixed `(Q, N)`.
pub trait CombinatorialSampler: Send + Sync {
    /// Feasible set this sampler draws from.
    fn mode(&self) -> AnalysisMode;

    /// Draw one element of the feasible set, sorted descending.
    fn draw(&self, q: u64, n: u64, rng: &mut dyn RngCore) -> Result<Vec<u64>, SamplingError>;

    /// Draw up to `batch` elements. The result may be shorter than `batch`;
    /// callers must check its length.
    fn draw_batch(
        &self,
        q: u64,
        n: u64,
        batch: usize,
        rng: &mut dyn RngCore,
    ) -> Result<Vec<Vec<u64>>, SamplingError> {
        (0..batch).map(|_| self.draw(q, n, rng)).collect()
    }
}

/// Build the sampler for an analysis mode.
pub fn sampler_for(mode: AnalysisMode) -> Box<dyn CombinatorialSampler> {
    match mode {
        AnalysisMode::Partition => Box::new(PartitionSampler::new()),
        AnalysisMode::Composition => Box::new(CompositionSampler::new()),
    }
}

/// Reject combinations with no feasible partition.
pub fn validate_combination(q: u64, n: u64) -> Result<(), SamplingError> {
    if n < 1 || q < n {
        return Err(SamplingError::InvalidCombination { q, n });
    }
    Ok(())
}

/// Verify a finished draw has `n` parts summing to `q`.
///
/// With `allow_zero == false` every part must also be positive.
pub fn check_draw(q: u64, n: u64, parts: &[u64], allow_zero: bool) -> Result<(), SamplingError> {
    let sum: u64 = parts.iter().sum();
    let has_zero = !allow_zero && parts.contains(&0);
    if parts.len() as u64 != n || sum != q || has_zero {
        return Err(SamplingError::InvariantViolation {
            q,
            n,
            len: parts.len(),
            sum,
        });
    }
    Ok(())
}
