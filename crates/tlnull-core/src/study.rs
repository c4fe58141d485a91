//! Study records and the per-study variance dataset.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// One `(Q, N)` combination with its empirical mean and variance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QnCombo {
    /// Total count.
    pub q: u64,
    /// Number of samples (quadrats, years, ...).
    pub n: u64,
    /// Empirical mean count per sample.
    pub mean: f64,
    /// Empirical variance of counts.
    pub var: f64,
}

impl QnCombo {
    pub fn new(q: u64, n: u64, mean: f64, var: f64) -> Self {
        Self { q, n, mean, var }
    }

    /// Combos with `N <= 2` cannot support a per-replicate regression.
    pub fn is_regression_eligible(&self) -> bool {
        self.n > 2
    }
}

/// A study: an id plus its combos in file order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudyRecord {
    pub id: String,
    pub combos: Vec<QnCombo>,
}

impl StudyRecord {
    pub fn new(id: impl Into<String>, combos: Vec<QnCombo>) -> Self {
        Self {
            id: id.into(),
            combos,
        }
    }

    /// Copy of the study without `N <= 2` combos, order preserved.
    pub fn regression_subset(&self) -> Self {
        Self {
            id: self.id.clone(),
            combos: self
                .combos
                .iter()
                .filter(|c| c.is_regression_eligible())
                .cloned()
                .collect(),
        }
    }

    pub fn means(&self) -> Vec<f64> {
        self.combos.iter().map(|c| c.mean).collect()
    }

    pub fn variances(&self) -> Vec<f64> {
        self.combos.iter().map(|c| c.var).collect()
    }
}

/// Loader row: `(study_id, Q, N, mean, var)`.
#[derive(Debug, Clone, PartialEq)]
pub struct QnRow {
    pub study: String,
    pub combo: QnCombo,
}

/// Group rows by study id.
///
/// Studies appear in order of first appearance; combos keep file order.
pub fn group_studies(rows: impl IntoIterator<Item = QnRow>) -> Vec<StudyRecord> {
    let mut studies: Vec<StudyRecord> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    for row in rows {
        match index.get(&row.study) {
            Some(&i) => studies[i].combos.push(row.combo),
            None => {
                index.insert(row.study.clone(), studies.len());
                studies.push(StudyRecord::new(row.study, vec![row.combo]));
            }
        }
    }
    studies
}

/// Null variances drawn for one combo.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComboVariances {
    pub combo: QnCombo,
    pub variances: Vec<f64>,
}

/// Full-size variance samples for every combo of one study.
///
/// Only built when every combo reached `sample_size`; a study with any
/// truncated combo has no dataset at all.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudyVarianceDataset {
    pub study_id: String,
    pub sample_size: usize,
    pub rows: Vec<ComboVariances>,
}

impl StudyVarianceDataset {
    /// Variances of replicate `i` across all combos, in combo order.
    pub fn replicate(&self, i: usize) -> Vec<f64> {
        self.rows.iter().map(|r| r.variances[i]).collect()
    }

    /// All replicates, each a vector over combos.
    pub fn replicates(&self) -> Vec<Vec<f64>> {
        (0..self.sample_size).map(|i| self.replicate(i)).collect()
    }

    pub fn means(&self) -> Vec<f64> {
        self.rows.iter().map(|r| r.combo.mean).collect()
    }

    pub fn empirical_variances(&self) -> Vec<f64> {
        self.rows.iter().map(|r| r.combo.var).collect()
    }
}
