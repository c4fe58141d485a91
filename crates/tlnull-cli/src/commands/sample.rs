//! `tlnull sample`: draw null variances for every study.

use std::path::{Path, PathBuf};
use std::time::Instant;

use tlnull_core::{
    AnalysisMode, FileSink, GroupedVarianceBuilder, RunConfig, RunRecorder, StudyRecord,
    SummarySink, TeeSink,
};

/// Flags of the sample command. `None` keeps the configuration value.
pub struct SampleCommandConfig<'a> {
    pub input: &'a str,
    pub mode: Option<AnalysisMode>,
    pub sample_size: Option<usize>,
    pub time_limit: Option<u64>,
    pub seed: Option<u64>,
    pub batch_size: Option<usize>,
    pub output_dir: Option<&'a str>,
    pub config_path: Option<&'a str>,
    pub regression_only: bool,
    pub filter: bool,
}

/// Apply command-line overrides on top of a loaded configuration.
fn resolve_config(mut config: RunConfig, cfg: &SampleCommandConfig<'_>) -> RunConfig {
    let sampling = &mut config.sampling;
    if let Some(mode) = cfg.mode {
        sampling.mode = mode;
    }
    if let Some(size) = cfg.sample_size {
        sampling.sample_size = size;
    }
    if let Some(secs) = cfg.time_limit {
        sampling.time_limit_secs = secs;
    }
    if let Some(seed) = cfg.seed {
        sampling.seed = Some(seed);
    }
    if let Some(batch) = cfg.batch_size {
        sampling.batch_size = batch.max(1);
    }
    config
}

/// Studies to sample: optionally only those passing inclusion, optionally
/// with `N <= 2` combos removed.
fn select_studies(
    studies: Vec<StudyRecord>,
    config: &RunConfig,
    filter: bool,
    regression_only: bool,
) -> Vec<StudyRecord> {
    studies
        .into_iter()
        .filter(|s| !filter || super::study_passes(s, &config.inclusion))
        .map(|s| if regression_only { s.regression_subset() } else { s })
        .filter(|s| !s.combos.is_empty())
        .collect()
}

pub fn run(cfg: SampleCommandConfig<'_>) {
    let config = resolve_config(super::load_run_config(cfg.config_path), &cfg);
    let loaded = super::load_studies(cfg.input);
    let loaded_count = loaded.len();
    let studies = select_studies(loaded, &config, cfg.filter, cfg.regression_only);

    let out_dir = cfg.output_dir.map_or_else(|| PathBuf::from("."), PathBuf::from);
    let mode = config.sampling.mode;

    let (full, summary_sink) = match (
        FileSink::create(&out_dir, mode),
        SummarySink::create(&out_dir, mode),
    ) {
        (Ok(f), Ok(s)) => (f, s),
        (Err(e), _) | (_, Err(e)) => {
            eprintln!("Error opening output in {}: {e}", out_dir.display());
            std::process::exit(1);
        }
    };

    let mut recorder = RunRecorder::start(config.clone()).with_input(Path::new(cfg.input));
    recorder.add_output(full.path());
    recorder.add_output(summary_sink.path());
    let mut sink = TeeSink::new().with(full).with(summary_sink);

    println!(
        "Sampling {} of {} studies: {} mode, {} draws per combo, {}s budget per combo",
        studies.len(),
        loaded_count,
        mode,
        config.sampling.sample_size,
        config.sampling.time_limit_secs
    );

    let t0 = Instant::now();
    let mut builder = GroupedVarianceBuilder::new(&config.sampling);
    let summary = match builder.run(&studies, &mut sink) {
        Ok(summary) => summary,
        Err(e) => {
            eprintln!("Error: run aborted: {e}");
            std::process::exit(1);
        }
    };

    let manifest = match recorder.finish(&out_dir, summary) {
        Ok(path) => path,
        Err(e) => {
            eprintln!("Error writing run manifest: {e}");
            std::process::exit(1);
        }
    };

    println!("\n{}", "=".repeat(50));
    println!("Studies:   {}", summary.studies);
    println!("Emitted:   {}", summary.emitted);
    println!("Timed out: {}", summary.truncated);
    println!("Invalid:   {}", summary.invalid);
    println!("Elapsed:   {:.1}s", t0.elapsed().as_secs_f64());
    println!("Manifest:  {}", manifest.display());
}
