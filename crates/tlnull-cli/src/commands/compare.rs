//! `tlnull compare`: empirical TL against the TL of each null replicate.

use std::path::Path;

use serde::Serialize;
use tlnull_core::{StudyVarianceDataset, load_variance_file};
use tlnull_stats::{QuadraticComparison, TlComparison, compare_quadratic, compare_to_null};

/// Comparison results for one study.
#[derive(Debug, Serialize)]
pub struct StudyComparison {
    pub study: String,
    pub combos: usize,
    pub replicates: usize,
    pub comparison: TlComparison,
    /// Quadratic term of the log-log fit, empirical and per replicate.
    pub quadratic: Option<QuadraticComparison>,
}

fn compare_study(dataset: &StudyVarianceDataset) -> Option<StudyComparison> {
    let means = dataset.means();
    let emp_vars = dataset.empirical_variances();
    let replicates = dataset.replicates();
    let comparison = match compare_to_null(&means, &emp_vars, &replicates) {
        Ok(c) => c,
        Err(e) => {
            log::warn!("Skipping study {}: {e}", dataset.study_id);
            return None;
        }
    };
    Some(StudyComparison {
        study: dataset.study_id.clone(),
        combos: dataset.rows.len(),
        replicates: dataset.sample_size,
        comparison,
        quadratic: compare_quadratic(&means, &emp_vars, &replicates).ok(),
    })
}

/// Compare every study, sorted by study id.
fn compare_all(datasets: &[StudyVarianceDataset]) -> Vec<StudyComparison> {
    let mut results: Vec<StudyComparison> = datasets.iter().filter_map(compare_study).collect();
    results.sort_by(|a, b| a.study.cmp(&b.study));
    results
}

fn print_table(results: &[StudyComparison]) {
    println!(
        "\n{:<20} {:>6} {:>8} {:>8} {:>8} {:>8} {:>7} {:>16} {:>9} {:>7}",
        "Study", "Combos", "emp b", "null b", "z(b)", "emp R²", "sig", "null b 95%", "quad p", "q sig"
    );
    println!("{}", "-".repeat(108));
    for r in results {
        let c = &r.comparison;
        let (quad_p, quad_sig) = match &r.quadratic {
            Some(q) => (
                q.empirical_p.map_or_else(|| "-".to_string(), |p| format!("{p:.4}")),
                format!("{:.1}%", q.fraction_significant * 100.0),
            ),
            None => ("-".to_string(), "-".to_string()),
        };
        println!(
            "{:<20} {:>6} {:>8.3} {:>8.3} {:>8.2} {:>8.3} {:>6.1}% {:>7.3}..{:<7.3} {:>9} {:>7}",
            r.study,
            r.combos,
            c.empirical.slope,
            c.mean_slope,
            c.slope_z,
            c.empirical.r_squared(),
            c.fraction_significant * 100.0,
            c.slope_lower,
            c.slope_upper,
            quad_p,
            quad_sig
        );
    }
}

pub fn run(input: &str, output_path: Option<&str>) {
    let datasets = match load_variance_file(Path::new(input)) {
        Ok(d) => d,
        Err(e) => {
            eprintln!("Error reading {input}: {e}");
            std::process::exit(1);
        }
    };

    let results = compare_all(&datasets);
    if results.is_empty() {
        eprintln!("No study in {input} could be compared.");
        std::process::exit(1);
    }
    print_table(&results);

    if let Some(path) = output_path {
        let json = match serde_json::to_string_pretty(&results) {
            Ok(j) => j,
            Err(e) => {
                eprintln!("Error serializing results: {e}");
                std::process::exit(1);
            }
        };
        if let Err(e) = std::fs::write(path, json) {
            eprintln!("Error writing {path}: {e}");
            std::process::exit(1);
        }
        println!("\nResults written to {path}");
    }
}
