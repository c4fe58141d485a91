//! Time-bounded accumulation of null variances for one `(Q, N)` combo.
//!
//! The collector draws from its sampler until it holds `sample_size`
//! variances or its wall-clock budget runs out. Running out of time is not an
//! error: the caller receives the shorter vector and decides what to do.
//! The budget is checked once per loop iteration, so a draw already in
//! progress always completes.

use std::sync::Arc;
use std::time::Duration;

use rand::RngCore;

use crate::clock::{Clock, Deadline, SystemClock};
use crate::config::SamplingConfig;
use crate::error::SamplingError;
use crate::sampler::{AnalysisMode, CombinatorialSampler, validate_combination};

/// Sample variance with the `N - 1` divisor.
///
/// Undefined (`NaN`) for fewer than two parts.
pub fn sample_variance(parts: &[u64]) -> f64 {
    let n = parts.len();
    if n < 2 {
        return f64::NAN;
    }
    let mean = parts.iter().map(|&p| p as f64).sum::<f64>() / n as f64;
    let ss: f64 = parts
        .iter()
        .map(|&p| {
            let d = p as f64 - mean;
            d * d
        })
        .sum();
    ss / (n - 1) as f64
}

/// Draws null variances for one combo under a wall-clock budget.
pub struct TimeBoundedCollector {
    sampler: Box<dyn CombinatorialSampler>,
    clock: Arc<dyn Clock>,
    sample_size: usize,
    time_limit: Duration,
    batch_size: usize,
}

impl TimeBoundedCollector {
    pub fn new(sampler: Box<dyn CombinatorialSampler>, config: &SamplingConfig) -> Self {
        Self {
            sampler,
            clock: Arc::new(SystemClock::new()),
            sample_size: config.sample_size,
            time_limit: config.time_limit(),
            batch_size: config.batch_size.max(1),
        }
    }

    /// Replace the wall clock (tests drive time by hand).
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_time_limit(mut self, limit: Duration) -> Self {
        self.time_limit = limit;
        self
    }

    pub fn sample_size(&self) -> usize {
        self.sample_size
    }

    pub fn mode(&self) -> AnalysisMode {
        self.sampler.mode()
    }

    /// Collect up to `sample_size` variances for `(q, n)`.
    ///
    /// Returns fewer than `sample_size` values only when the time budget ran
    /// out. Sampler errors propagate unchanged.
    pub fn collect(
        &self,
        q: u64,
        n: u64,
        rng: &mut dyn RngCore,
    ) -> Result<Vec<f64>, SamplingError> {
        validate_combination(q, n)?;

        let deadline = Deadline::arm(self.clock.as_ref(), self.time_limit);
        let mut variances = Vec::with_capacity(self.sample_size);

        while variances.len() < self.sample_size {
            if deadline.expired() {
                log::warn!(
                    "Timed out: Q={q}, N={n} after {:.1}s with {}/{} draws",
                    deadline.elapsed().as_secs_f64(),
                    variances.len(),
                    self.sample_size
                );
                break;
            }
            let remaining = self.sample_size - variances.len();
            let batch = self
                .sampler
                .draw_batch(q, n, self.batch_size.min(remaining), rng)?;
            variances.extend(batch.iter().take(remaining).map(|d| sample_variance(d)));
        }

        log::debug!(
            "collected {} {} variances for Q={q}, N={n}",
            variances.len(),
            self.sampler.mode()
        );
        Ok(variances)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::sampler::sampler_for;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn config(sample_size: usize) -> SamplingConfig {
        SamplingConfig {
            sample_size,
            ..Default::default()
        }
    }

    /// Always returns the same draw; counts calls.
    struct FixedSampler {
        parts: Vec<u64>,
        calls: Arc<AtomicUsize>,
    }

    impl CombinatorialSampler for FixedSampler {
        fn mode(&self) -> AnalysisMode {
            AnalysisMode::Partition
        }

        fn draw(&self, _q: u64, _n: u64, _rng: &mut dyn RngCore) -> Result<Vec<u64>, SamplingError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.parts.clone())
        }
    }

    // -----------------------------------------------------------------------
    // Variance tests
    // -----------------------------------------------------------------------

    #[test]
    fn test_variance_of_equal_parts_is_zero() {
        assert_eq!(sample_variance(&[3, 3, 3]), 0.0);
    }

    #[test]
    fn test_variance_uses_n_minus_one() {
        // mean 2, squared deviations 1 + 0 + 1 = 2, divided by 2
        assert!((sample_variance(&[3, 2, 1]) - 1.0).abs() < 1e-12);
        assert!((sample_variance(&[4, 1, 1]) - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_variance_single_part_is_nan() {
        assert!(sample_variance(&[9]).is_nan());
        assert!(sample_variance(&[]).is_nan());
    }

    // -----------------------------------------------------------------------
    // Collection tests
    // -----------------------------------------------------------------------

    #[test]
    fn test_ample_time_returns_full_sample() {
        let mut rng = StdRng::seed_from_u64(1);
        for mode in [AnalysisMode::Partition, AnalysisMode::Composition] {
            let collector = TimeBoundedCollector::new(sampler_for(mode), &config(10));
            let vars = collector.collect(20, 4, &mut rng).unwrap();
            assert_eq!(vars.len(), 10, "{mode}");
            assert!(vars.iter().all(|v| v.is_finite() && *v >= 0.0));
        }
    }

    #[test]
    fn test_zero_time_limit_returns_empty() {
        let mut rng = StdRng::seed_from_u64(1);
        let collector = TimeBoundedCollector::new(sampler_for(AnalysisMode::Partition), &config(10))
            .with_time_limit(Duration::ZERO);
        let vars = collector.collect(20, 4, &mut rng).unwrap();
        assert!(vars.is_empty());
    }

    #[test]
    fn test_expired_clock_returns_empty() {
        let mut rng = StdRng::seed_from_u64(1);
        let clock = Arc::new(ManualClock::stepping(Duration::from_secs(10_000)));
        let collector = TimeBoundedCollector::new(sampler_for(AnalysisMode::Composition), &config(10))
            .with_clock(clock);
        assert!(collector.collect(20, 4, &mut rng).unwrap().is_empty());
    }

    #[test]
    fn test_budget_truncates_mid_collection() {
        // Each clock read advances 1s. Arming reads once, then one read per
        // iteration: reads at 1s..=4s pass a 5s budget, the read at 5s stops.
        let mut rng = StdRng::seed_from_u64(1);
        let clock = Arc::new(ManualClock::stepping(Duration::from_secs(1)));
        let cfg = SamplingConfig {
            sample_size: 100,
            time_limit_secs: 5,
            ..Default::default()
        };
        let collector = TimeBoundedCollector::new(sampler_for(AnalysisMode::Partition), &cfg)
            .with_clock(clock);
        let vars = collector.collect(30, 5, &mut rng).unwrap();
        assert_eq!(vars.len(), 4);
    }

    #[test]
    fn test_degenerate_partition_variance_is_zero() {
        let mut rng = StdRng::seed_from_u64(1);
        let collector = TimeBoundedCollector::new(sampler_for(AnalysisMode::Partition), &config(5));
        let vars = collector.collect(9, 9, &mut rng).unwrap();
        assert_eq!(vars, vec![0.0; 5]);

        let fixed = FixedSampler {
            parts: vec![3, 3, 3],
            calls: Default::default(),
        };
        let collector = TimeBoundedCollector::new(Box::new(fixed), &config(3));
        assert_eq!(collector.collect(9, 3, &mut rng).unwrap(), vec![0.0; 3]);
    }

    #[test]
    fn test_invalid_combination_propagates_even_without_time() {
        let mut rng = StdRng::seed_from_u64(1);
        let collector = TimeBoundedCollector::new(sampler_for(AnalysisMode::Partition), &config(5))
            .with_time_limit(Duration::ZERO);
        assert_eq!(
            collector.collect(3, 5, &mut rng),
            Err(SamplingError::InvalidCombination { q: 3, n: 5 })
        );
    }

    #[test]
    fn test_batches_never_overshoot_sample_size() {
        let mut rng = StdRng::seed_from_u64(1);
        let cfg = SamplingConfig {
            sample_size: 7,
            batch_size: 4,
            mode: AnalysisMode::Composition,
            ..Default::default()
        };
        let collector = TimeBoundedCollector::new(sampler_for(cfg.mode), &cfg);
        assert_eq!(collector.collect(50, 6, &mut rng).unwrap().len(), 7);
    }

    #[test]
    fn test_one_draw_per_variance_with_unit_batches() {
        let mut rng = StdRng::seed_from_u64(1);
        let calls = Arc::new(AtomicUsize::new(0));
        let fixed = FixedSampler {
            parts: vec![5, 1],
            calls: calls.clone(),
        };
        let collector = TimeBoundedCollector::new(Box::new(fixed), &config(12));
        assert_eq!(collector.collect(6, 2, &mut rng).unwrap(), vec![8.0; 12]);
        assert_eq!(calls.load(Ordering::SeqCst), 12);
        assert_eq!(collector.mode(), AnalysisMode::Partition);
        assert_eq!(collector.sample_size(), 12);
    }
}
