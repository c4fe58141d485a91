//! `tlnull filter`: list studies that pass the inclusion criteria.

pub fn run(input: &str, sig: bool, config_path: Option<&str>) {
    let mut criteria = super::load_run_config(config_path).inclusion;
    criteria.require_significance |= sig;
    let studies = super::load_studies(input);

    let passing: Vec<_> = studies
        .iter()
        .filter(|s| super::study_passes(s, &criteria))
        .collect();

    println!(
        "{} of {} studies pass (Q >= {}, N >= {}, at least {} combos{})",
        passing.len(),
        studies.len(),
        criteria.q_min,
        criteria.n_min,
        criteria.min_combos,
        if criteria.require_significance {
            ", significant TL"
        } else {
            ""
        }
    );
    for study in passing {
        println!("{}\t{}", study.id, study.combos.len());
    }
}
