//! Run configuration: sampling parameters and study inclusion thresholds.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::LoadError;
use crate::sampler::AnalysisMode;

pub use tlnull_stats::InclusionCriteria;

/// Default number of null draws per `(Q, N)` combo.
pub const DEFAULT_SAMPLE_SIZE: usize = 1000;

/// Default per-combo wall-clock budget (two hours).
pub const DEFAULT_TIME_LIMIT_SECS: u64 = 7200;

/// Parameters of the time-bounded collection loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingConfig {
    /// Target number of variances per combo.
    pub sample_size: usize,
    /// Budget per combo, in seconds.
    pub time_limit_secs: u64,
    pub mode: AnalysisMode,
    /// Draws requested from the sampler per loop iteration.
    pub batch_size: usize,
    /// Fixed RNG seed for reproducible runs.
    pub seed: Option<u64>,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            sample_size: DEFAULT_SAMPLE_SIZE,
            time_limit_secs: DEFAULT_TIME_LIMIT_SECS,
            mode: AnalysisMode::Partition,
            batch_size: 1,
            seed: None,
        }
    }
}

impl SamplingConfig {
    pub fn time_limit(&self) -> Duration {
        Duration::from_secs(self.time_limit_secs)
    }
}

/// Everything a run reads from a configuration file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub sampling: SamplingConfig,
    pub inclusion: InclusionCriteria,
}

impl RunConfig {
    /// Load a JSON configuration. Missing fields take their defaults.
    pub fn load(path: &Path) -> Result<Self, LoadError> {
        let text = std::fs::read_to_string(path)?;
        serde_json::from_str(&text).map_err(|e| LoadError::Parse {
            line: e.line(),
            reason: e.to_string(),
        })
    }
}
