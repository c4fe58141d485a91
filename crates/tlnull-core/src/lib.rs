//! # tlnull-core
//!
//! **Taylor's Law against the feasible set.**
//!
//! `tlnull-core` draws the null distribution of variances that pure
//! combinatorial constraints impose on count data. For a total count `Q`
//! spread over `N` samples it draws uniformly random integer partitions (or
//! weak compositions) of `Q` into `N` parts, takes the variance of each, and
//! gathers those variances per `(Q, N)` combo and per study.
//!
//! ## Quick Start
//!
//! ```no_run
//! use tlnull_core::{GroupedVarianceBuilder, MemorySink, QnCombo, SamplingConfig, StudyRecord};
//!
//! # fn main() -> Result<(), tlnull_core::RunError> {
//! let config = SamplingConfig {
//!     sample_size: 100,
//!     seed: Some(7),
//!     ..Default::default()
//! };
//! let study = StudyRecord::new(
//!     "bbs_1",
//!     vec![QnCombo::new(30, 5, 6.0, 4.5), QnCombo::new(48, 6, 8.0, 9.1)],
//! );
//!
//! let mut sink = MemorySink::new();
//! let summary = GroupedVarianceBuilder::new(&config).run(&[study], &mut sink)?;
//! println!("{} of {} studies complete", summary.emitted, summary.studies);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! Sampler → Collector (time budget) → Builder (all-or-nothing) → Sink
//!
//! Two feasible sets:
//! - **Partition** (default): unordered partitions into positive parts, each
//!   distinct multiset equally likely.
//! - **Composition**: ordered weak compositions from random cut points,
//!   sorted and deduplicated per batch.
//!
//! Every sampler implements [`CombinatorialSampler`]. The
//! [`TimeBoundedCollector`] draws until it has `sample_size` variances or its
//! [`Deadline`] expires; the [`GroupedVarianceBuilder`] keeps a study only if
//! every combo came back complete.

pub mod builder;
pub mod clock;
pub mod collector;
pub mod composition;
pub mod config;
pub mod dedup;
pub mod error;
pub mod loader;
pub mod manifest;
pub mod partition;
pub mod sampler;
pub mod sink;
pub mod study;

pub use builder::{GroupedVarianceBuilder, RunSummary};
pub use clock::{Clock, Deadline, ManualClock, SystemClock};
pub use collector::{TimeBoundedCollector, sample_variance};
pub use composition::CompositionSampler;
pub use config::{
    DEFAULT_SAMPLE_SIZE, DEFAULT_TIME_LIMIT_SECS, InclusionCriteria, RunConfig, SamplingConfig,
};
pub use dedup::deduplicate;
pub use error::{LoadError, RunError, SamplingError};
pub use loader::{load_qn_file, load_variance_file, parse_qn_records, parse_variance_rows};
pub use manifest::{RunManifest, RunRecorder};
pub use partition::{MAX_TABLE_CELLS, PartitionSampler, ln_partition_count};
pub use sampler::{
    AnalysisMode, CombinatorialSampler, check_draw, sampler_for, validate_combination,
};
pub use sink::{
    FileSink, MemorySink, SummarySink, TeeSink, VarianceSink, full_variance_file_name,
    summary_file_name,
};
pub use study::{
    ComboVariances, QnCombo, QnRow, StudyRecord, StudyVarianceDataset, group_studies,
};

/// Library version (from Cargo.toml).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
