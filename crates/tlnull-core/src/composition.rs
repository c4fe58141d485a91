//! Random weak compositions of `Q` into `N` non-negative parts.
//!
//! `N-1` distinct cut points are chosen uniformly from `{0, .., Q-1}`, sorted,
//! and the parts are the gaps between consecutive cuts with `0` and `Q` as
//! virtual boundaries. A cut at `0` leaves the first part empty, so parts can
//! be zero. The composition is then sorted descending to share the canonical
//! shape of partition draws.

use rand::RngCore;
use rand::seq::index;

use crate::dedup::deduplicate;
use crate::error::SamplingError;
use crate::sampler::{AnalysisMode, CombinatorialSampler, check_draw, validate_combination};

/// Draw the ordered composition (gaps between sorted cut points).
fn weak_composition(q: u64, n: u64, rng: &mut dyn RngCore) -> Vec<u64> {
    // Uniform (N-1)-subset, i.e. iid draws conditioned on being distinct.
    let mut cuts: Vec<u64> = index::sample(rng, q as usize, (n - 1) as usize)
        .into_iter()
        .map(|c| c as u64)
        .collect();
    cuts.sort_unstable();

    let mut parts = Vec::with_capacity(n as usize);
    let mut prev = 0;
    for cut in cuts {
        parts.push(cut - prev);
        prev = cut;
    }
    parts.push(q - prev);
    parts
}

/// Composition sampler. Batches are deduplicated before they are returned.
#[derive(Debug, Default, Clone, Copy)]
pub struct CompositionSampler;

impl CompositionSampler {
    pub fn new() -> Self {
        Self
    }
}

impl CombinatorialSampler for CompositionSampler {
    fn mode(&self) -> AnalysisMode {
        AnalysisMode::Composition
    }

    fn draw(&self, q: u64, n: u64, rng: &mut dyn RngCore) -> Result<Vec<u64>, SamplingError> {
        validate_combination(q, n)?;
        let mut parts = weak_composition(q, n, rng);
        check_draw(q, n, &parts, true)?;
        parts.sort_unstable_by(|a, b| b.cmp(a));
        Ok(parts)
    }

    fn draw_batch(
        &self,
        q: u64,
        n: u64,
        batch: usize,
        rng: &mut dyn RngCore,
    ) -> Result<Vec<Vec<u64>>, SamplingError> {
        let draws = (0..batch)
            .map(|_| self.draw(q, n, rng))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(deduplicate(draws))
    }
}
