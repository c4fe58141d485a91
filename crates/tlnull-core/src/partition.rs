//! Uniform random integer partitions of `Q` into exactly `N` positive parts.
//!
//! A partition of `Q` into exactly `N` parts either contains a part equal to
//! one (remove it: a partition of `Q-1` into `N-1` parts) or has every part at
//! least two (subtract one from each: a partition of `Q-N` into `N` parts).
//! Writing `m = Q - N`, both branches are counted by `P(m, k)`, the number of
//! partitions of `m` into at most `k` parts:
//!
//! ```text
//! P(m, k) = P(m, k-1) + P(m-k, k)      (second term only when m >= k)
//! P(0, k) = 1,  P(m, 0) = 0 for m > 0
//! ```
//!
//! Sampling walks that recursion from `(Q-N, N)`, taking each branch with
//! probability proportional to its completion count, so every partition is
//! reached with probability `1 / P(Q-N, N)`. Counts are stored as natural
//! logarithms; partition numbers overflow `u128` well before realistic `Q`.
//!
//! The table holds `(Q-N+1) * (min(N, Q-N)+1)` values and is built inside a
//! single draw, out of reach of the collector's deadline. Combinations above
//! [`MAX_TABLE_CELLS`] are refused with [`SamplingError::CombinationTooLarge`].

use std::sync::Mutex;

use rand::{Rng, RngCore};

use crate::error::SamplingError;
use crate::sampler::{AnalysisMode, CombinatorialSampler, check_draw, validate_combination};

/// Largest counting table a draw will build: 2^27 cells, 1 GiB of `f64`.
pub const MAX_TABLE_CELLS: u64 = 1 << 27;

/// Table of `ln P(m, k)` for `m <= max_m`, `k <= max_k`.
///
/// Columns stop at `max_k = min(N, Q-N)` since `P(m, k) = P(m, m)` for `k >= m`.
#[derive(Debug, Clone)]
struct CountTable {
    q: u64,
    n: u64,
    max_m: usize,
    max_k: usize,
    ln_counts: Vec<f64>,
}

impl CountTable {
    /// Cells needed for `(q, n)`. Assumes `q >= n`.
    fn cells(q: u64, n: u64) -> u64 {
        let max_m = q - n;
        (max_m + 1).saturating_mul(n.min(max_m) + 1)
    }

    fn build(q: u64, n: u64) -> Result<Self, SamplingError> {
        let cells = Self::cells(q, n);
        if cells > MAX_TABLE_CELLS {
            log::warn!("Refusing partition table for Q={q}, N={n}: {cells} cells");
            return Err(SamplingError::CombinationTooLarge { q, n, cells });
        }
        let max_m = (q - n) as usize;
        let max_k = (n as usize).min(max_m);
        let width = max_k + 1;
        let mut ln_counts = vec![f64::NEG_INFINITY; (max_m + 1) * width];

        ln_counts[..width].fill(0.0);
        for m in 1..=max_m {
            for k in 1..width {
                let without_one = ln_counts[m * width + k - 1];
                ln_counts[m * width + k] = if m >= k {
                    log_add_exp(without_one, ln_counts[(m - k) * width + k])
                } else {
                    without_one
                };
            }
        }

        Ok(Self {
            q,
            n,
            max_m,
            max_k,
            ln_counts,
        })
    }

    fn matches(&self, q: u64, n: u64) -> bool {
        self.q == q && self.n == n
    }

    fn ln_count(&self, m: usize, k: usize) -> f64 {
        debug_assert!(m <= self.max_m);
        self.ln_counts[m * (self.max_k + 1) + k.min(self.max_k)]
    }

    /// Walk the recursion once. Parts come out non-decreasing.
    fn walk(&self, rng: &mut dyn RngCore) -> Vec<u64> {
        let mut parts = Vec::with_capacity(self.n as usize);
        let mut m = self.max_m;
        let mut k = self.n as usize;
        let mut shift: u64 = 0;

        while k > 0 {
            let take_one = if m < k {
                true
            } else {
                let p_one = (self.ln_count(m, k - 1) - self.ln_count(m, k)).exp();
                rng.random::<f64>() < p_one
            };
            if take_one {
                parts.push(1 + shift);
                k -= 1;
            } else {
                shift += 1;
                m -= k;
            }
        }
        parts
    }
}

fn log_add_exp(a: f64, b: f64) -> f64 {
    if a == f64::NEG_INFINITY {
        return b;
    }
    if b == f64::NEG_INFINITY {
        return a;
    }
    let hi = a.max(b);
    hi + (-(a - b).abs()).exp().ln_1p()
}

/// Natural log of the number of partitions of `q` into exactly `n` positive parts.
pub fn ln_partition_count(q: u64, n: u64) -> Result<f64, SamplingError> {
    validate_combination(q, n)?;
    let table = CountTable::build(q, n)?;
    Ok(table.ln_count(table.max_m, n as usize))
}

/// Uniform sampler over partitions of `Q` into exactly `N` parts.
///
/// The counting table for the most recent `(Q, N)` is kept, so repeated draws
/// for one combination pay for it once.
#[derive(Debug, Default)]
pub struct PartitionSampler {
    table: Mutex<Option<CountTable>>,
}

impl PartitionSampler {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CombinatorialSampler for PartitionSampler {
    fn mode(&self) -> AnalysisMode {
        AnalysisMode::Partition
    }

    fn draw(&self, q: u64, n: u64, rng: &mut dyn RngCore) -> Result<Vec<u64>, SamplingError> {
        validate_combination(q, n)?;

        let mut cached = self.table.lock().unwrap_or_else(|e| e.into_inner());
        let table = match cached.take() {
            Some(table) if table.matches(q, n) => table,
            _ => {
                log::debug!("building partition count table for Q={q}, N={n}");
                CountTable::build(q, n)?
            }
        };
        let mut parts = table.walk(rng);
        *cached = Some(table);
        drop(cached);

        parts.reverse();
        check_draw(q, n, &parts, false)?;
        Ok(parts)
    }
}
