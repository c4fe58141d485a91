pub mod compare;
pub mod filter;
pub mod sample;

use std::path::Path;

use tlnull_core::{InclusionCriteria, RunConfig, StudyRecord, load_qn_file};
use tlnull_stats::passes_inclusion;

/// Load the run configuration, or defaults when no path is given.
pub fn load_run_config(path: Option<&str>) -> RunConfig {
    let Some(path) = path else {
        return RunConfig::default();
    };
    match RunConfig::load(Path::new(path)) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error reading config {path}: {e}");
            std::process::exit(1);
        }
    }
}

/// Load a study file or exit.
pub fn load_studies(path: &str) -> Vec<StudyRecord> {
    match load_qn_file(Path::new(path)) {
        Ok(studies) => studies,
        Err(e) => {
            eprintln!("Error reading {path}: {e}");
            std::process::exit(1);
        }
    }
}

pub fn study_passes(study: &StudyRecord, criteria: &InclusionCriteria) -> bool {
    let qs: Vec<u64> = study.combos.iter().map(|c| c.q).collect();
    let ns: Vec<u64> = study.combos.iter().map(|c| c.n).collect();
    passes_inclusion(&qs, &ns, &study.means(), &study.variances(), criteria)
}
