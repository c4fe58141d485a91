//! Per-study variance datasets under the all-or-nothing rule.
//!
//! [`GroupedVarianceBuilder::build`] walks a study's combos in order and
//! stops at the first combo whose collection came back short. Such a study
//! yields no dataset at all: per-replicate fits need equal-length samples for
//! every combo. [`GroupedVarianceBuilder::run`] drives a whole batch of
//! studies into a [`VarianceSink`].

use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

use crate::collector::TimeBoundedCollector;
use crate::config::SamplingConfig;
use crate::error::{RunError, SamplingError};
use crate::sampler::{AnalysisMode, sampler_for};
use crate::sink::VarianceSink;
use crate::study::{ComboVariances, StudyRecord, StudyVarianceDataset};

/// Outcome counts of a batch run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Studies examined.
    pub studies: usize,
    /// Studies written to the sink.
    pub emitted: usize,
    /// Studies discarded because a combo timed out.
    pub truncated: usize,
    /// Studies skipped because a combo had no feasible set.
    pub invalid: usize,
}

/// Builds one [`StudyVarianceDataset`] per study.
pub struct GroupedVarianceBuilder {
    collector: TimeBoundedCollector,
    rng: StdRng,
}

impl GroupedVarianceBuilder {
    /// Builder for `config`, seeded from `config.seed` when set.
    pub fn new(config: &SamplingConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_rng(&mut rand::rng()),
        };
        Self::with_collector(TimeBoundedCollector::new(sampler_for(config.mode), config), rng)
    }

    pub fn with_collector(collector: TimeBoundedCollector, rng: StdRng) -> Self {
        Self { collector, rng }
    }

    pub fn mode(&self) -> AnalysisMode {
        self.collector.mode()
    }

    pub fn sample_size(&self) -> usize {
        self.collector.sample_size()
    }

    /// Sample every combo of `study`, in order.
    ///
    /// Returns `Ok(None)` as soon as one combo comes back short; later combos
    /// are not sampled. Sampler errors propagate unchanged.
    pub fn build(
        &mut self,
        study: &StudyRecord,
    ) -> Result<Option<StudyVarianceDataset>, SamplingError> {
        let sample_size = self.collector.sample_size();
        let mut rows = Vec::with_capacity(study.combos.len());

        for combo in &study.combos {
            let variances = self.collector.collect(combo.q, combo.n, &mut self.rng)?;
            if variances.len() < sample_size {
                log::info!(
                    "Study {}: Q={}, N={} got {}/{} draws, discarding study",
                    study.id,
                    combo.q,
                    combo.n,
                    variances.len(),
                    sample_size
                );
                return Ok(None);
            }
            rows.push(ComboVariances {
                combo: combo.clone(),
                variances,
            });
        }

        Ok(Some(StudyVarianceDataset {
            study_id: study.id.clone(),
            sample_size,
            rows,
        }))
    }

    /// Build every study and append complete datasets to `sink`.
    ///
    /// A study with an invalid or oversized combo is skipped. An invariant violation or a
    /// sink failure stops the run.
    pub fn run(
        &mut self,
        studies: &[StudyRecord],
        sink: &mut dyn VarianceSink,
    ) -> Result<RunSummary, RunError> {
        let mut summary = RunSummary::default();

        for study in studies {
            summary.studies += 1;
            match self.build(study) {
                Ok(Some(dataset)) => {
                    sink.append(&dataset)?;
                    summary.emitted += 1;
                    log::info!(
                        "Study {} emitted: {} combos x {} {} draws",
                        study.id,
                        dataset.rows.len(),
                        dataset.sample_size,
                        self.collector.mode()
                    );
                }
                Ok(None) => summary.truncated += 1,
                Err(e) if e.is_fatal() => return Err(e.into()),
                Err(e) => {
                    log::warn!("Skipping study {}: {e}", study.id);
                    summary.invalid += 1;
                }
            }
        }

        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::sampler::CombinatorialSampler;
    use crate::sink::MemorySink;
    use crate::study::QnCombo;
    use rand::RngCore;
    use std::io;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    /// Records every `(q, n)` it is asked for. Draws for `slow_q` advance the
    /// shared clock far past any budget.
    struct ScriptedSampler {
        calls: Arc<Mutex<Vec<(u64, u64)>>>,
        clock: Arc<ManualClock>,
        slow_q: Option<u64>,
        fail_q: Option<u64>,
    }

    impl CombinatorialSampler for ScriptedSampler {
        fn mode(&self) -> AnalysisMode {
            AnalysisMode::Partition
        }

        fn draw(&self, q: u64, n: u64, _rng: &mut dyn RngCore) -> Result<Vec<u64>, SamplingError> {
            self.calls.lock().unwrap().push((q, n));
            if self.slow_q == Some(q) {
                self.clock.advance(Duration::from_secs(1000));
            }
            if self.fail_q == Some(q) {
                return Err(SamplingError::InvariantViolation { q, n, len: 0, sum: 0 });
            }
            let mut parts = vec![1; n as usize];
            parts[0] = q - n + 1;
            Ok(parts)
        }
    }

    struct Harness {
        builder: GroupedVarianceBuilder,
        calls: Arc<Mutex<Vec<(u64, u64)>>>,
    }

    fn harness(sample_size: usize, slow_q: Option<u64>, fail_q: Option<u64>) -> Harness {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let clock = Arc::new(ManualClock::new());
        let sampler = ScriptedSampler {
            calls: calls.clone(),
            clock: clock.clone(),
            slow_q,
            fail_q,
        };
        let config = SamplingConfig {
            sample_size,
            time_limit_secs: 10,
            ..Default::default()
        };
        let collector = TimeBoundedCollector::new(Box::new(sampler), &config).with_clock(clock);
        Harness {
            builder: GroupedVarianceBuilder::with_collector(collector, StdRng::seed_from_u64(0)),
            calls,
        }
    }

    fn study(id: &str, combos: &[(u64, u64)]) -> StudyRecord {
        StudyRecord::new(
            id,
            combos
                .iter()
                .map(|&(q, n)| QnCombo::new(q, n, q as f64 / n as f64, 1.0))
                .collect(),
        )
    }

    struct FailingSink;

    impl VarianceSink for FailingSink {
        fn append(&mut self, _dataset: &StudyVarianceDataset) -> io::Result<()> {
            Err(io::Error::other("disk full"))
        }
    }

    // -----------------------------------------------------------------------
    // Single study
    // -----------------------------------------------------------------------

    #[test]
    fn test_complete_study_yields_dataset() {
        let mut h = harness(4, None, None);
        let s = study("s", &[(10, 3), (20, 4), (30, 5)]);
        let dataset = h.builder.build(&s).unwrap().unwrap();
        assert_eq!(dataset.study_id, "s");
        assert_eq!(dataset.sample_size, 4);
        assert_eq!(dataset.rows.len(), 3);
        assert!(dataset.rows.iter().all(|r| r.variances.len() == 4));
        assert_eq!(h.calls.lock().unwrap().len(), 12);
    }

    #[test]
    fn test_timeout_discards_study_and_short_circuits() {
        let mut h = harness(5, Some(20), None);
        let s = study("s", &[(10, 3), (20, 4), (30, 5)]);
        assert_eq!(h.builder.build(&s).unwrap(), None);

        let calls = h.calls.lock().unwrap();
        assert_eq!(calls.iter().filter(|c| c.0 == 10).count(), 5);
        assert_eq!(calls.iter().filter(|c| c.0 == 20).count(), 1);
        assert!(!calls.iter().any(|c| c.0 == 30), "third combo was sampled");
    }

    #[test]
    fn test_timeout_emits_nothing_in_run() {
        let mut h = harness(5, Some(20), None);
        let mut sink = MemorySink::new();
        let summary = h
            .builder
            .run(&[study("s", &[(10, 3), (20, 4), (30, 5)])], &mut sink)
            .unwrap();
        assert!(sink.datasets().is_empty());
        assert_eq!(summary.truncated, 1);
        assert_eq!(summary.emitted, 0);
    }

    #[test]
    fn test_invalid_combo_propagates_from_build() {
        let mut builder = GroupedVarianceBuilder::new(&SamplingConfig {
            sample_size: 3,
            seed: Some(1),
            ..Default::default()
        });
        let s = study("s", &[(10, 3), (2, 4)]);
        assert_eq!(
            builder.build(&s),
            Err(SamplingError::InvalidCombination { q: 2, n: 4 })
        );
    }

    // -----------------------------------------------------------------------
    // Batch runs
    // -----------------------------------------------------------------------

    #[test]
    fn test_run_skips_invalid_studies() {
        let mut builder = GroupedVarianceBuilder::new(&SamplingConfig {
            sample_size: 3,
            seed: Some(1),
            ..Default::default()
        });
        let studies = vec![
            study("a", &[(10, 3), (12, 4)]),
            study("bad", &[(10, 3), (2, 4)]),
            study("c", &[(15, 5)]),
        ];
        let mut sink = MemorySink::new();
        let summary = builder.run(&studies, &mut sink).unwrap();
        assert_eq!(
            summary,
            RunSummary {
                studies: 3,
                emitted: 2,
                truncated: 0,
                invalid: 1,
            }
        );
        let ids: Vec<&str> = sink.datasets().iter().map(|d| d.study_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c"]);
    }

    #[test]
    fn test_run_skips_study_with_oversized_partition_table() {
        let mut builder = GroupedVarianceBuilder::new(&SamplingConfig {
            sample_size: 3,
            seed: Some(1),
            ..Default::default()
        });
        let studies = vec![
            study("huge", &[(10, 3), (2_000_000, 1_000)]),
            study("ok", &[(12, 4)]),
        ];
        let mut sink = MemorySink::new();
        let summary = builder.run(&studies, &mut sink).unwrap();
        assert_eq!(summary.emitted, 1);
        assert_eq!(summary.invalid, 1);
        assert_eq!(sink.datasets()[0].study_id, "ok");
    }

    #[test]
    fn test_run_aborts_on_invariant_violation() {
        let mut h = harness(2, None, Some(20));
        let studies = vec![study("a", &[(20, 4)]), study("b", &[(10, 3)])];
        let mut sink = MemorySink::new();
        let err = h.builder.run(&studies, &mut sink).unwrap_err();
        assert!(matches!(
            err,
            RunError::Sampling(SamplingError::InvariantViolation { .. })
        ));
        assert!(!h.calls.lock().unwrap().iter().any(|c| c.0 == 10));
    }

    #[test]
    fn test_run_aborts_on_sink_failure() {
        let mut h = harness(2, None, None);
        let err = h
            .builder
            .run(&[study("a", &[(10, 3)])], &mut FailingSink)
            .unwrap_err();
        assert!(matches!(err, RunError::Sink(_)));
    }

    #[test]
    fn test_seeded_builders_are_reproducible() {
        let config = SamplingConfig {
            sample_size: 20,
            seed: Some(42),
            mode: AnalysisMode::Composition,
            ..Default::default()
        };
        let s = study("s", &[(40, 5), (60, 7)]);
        let a = GroupedVarianceBuilder::new(&config).build(&s).unwrap();
        let b = GroupedVarianceBuilder::new(&config).build(&s).unwrap();
        assert!(a.is_some());
        assert_eq!(a, b);
    }

    #[test]
    fn test_builder_reports_mode_and_size() {
        let builder = GroupedVarianceBuilder::new(&SamplingConfig {
            sample_size: 7,
            mode: AnalysisMode::Composition,
            ..Default::default()
        });
        assert_eq!(builder.mode(), AnalysisMode::Composition);
        assert_eq!(builder.sample_size(), 7);
    }
}
