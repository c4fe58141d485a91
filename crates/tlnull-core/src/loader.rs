//! Tab-delimited input files.
//!
//! Two formats are read:
//! - study summaries, `study Q N mean var`, one row per combo;
//! - sampler output, `study Q N mean var v1 .. vk`, as written by
//!   [`FileSink`](crate::sink::FileSink).
//!
//! Blank lines and lines starting with `#` are skipped. Line numbers in
//! errors are 1-based.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::str::FromStr;

use crate::error::LoadError;
use crate::study::{ComboVariances, QnCombo, QnRow, StudyRecord, StudyVarianceDataset};

fn parse_field<T: FromStr>(
    fields: &[&str],
    idx: usize,
    name: &str,
    line: usize,
) -> Result<T, LoadError> {
    let raw = fields.get(idx).ok_or_else(|| LoadError::Parse {
        line,
        reason: format!("missing {name} column"),
    })?;
    raw.trim().parse().map_err(|_| LoadError::Parse {
        line,
        reason: format!("invalid {name}: {raw:?}"),
    })
}

/// Split the leading `study Q N mean var` columns of one line.
fn parse_combo_row(fields: &[&str], line: usize) -> Result<QnRow, LoadError> {
    let study = fields
        .first()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| LoadError::Parse {
            line,
            reason: "missing study column".to_string(),
        })?;
    let q: u64 = parse_field(fields, 1, "Q", line)?;
    let n: u64 = parse_field(fields, 2, "N", line)?;
    let mean: f64 = parse_field(fields, 3, "mean", line)?;
    let var: f64 = parse_field(fields, 4, "var", line)?;
    Ok(QnRow {
        study: study.to_string(),
        combo: QnCombo::new(q, n, mean, var),
    })
}

/// Iterate over `(line_number, fields)` of the data lines in `reader`.
fn data_lines<R: BufRead>(
    reader: R,
) -> impl Iterator<Item = Result<(usize, String), LoadError>> {
    reader
        .lines()
        .enumerate()
        .map(|(i, line)| line.map(|l| (i + 1, l)).map_err(LoadError::from))
        .filter(|res| match res {
            Ok((_, l)) => {
                let t = l.trim();
                !t.is_empty() && !t.starts_with('#')
            }
            Err(_) => true,
        })
}

// ---------------------------------------------------------------------------
// Study summaries
// ---------------------------------------------------------------------------

/// Parse `study Q N mean var` rows and group them by study.
pub fn parse_qn_records<R: BufRead>(reader: R) -> Result<Vec<StudyRecord>, LoadError> {
    let mut rows = Vec::new();
    for entry in data_lines(reader) {
        let (line, text) = entry?;
        let fields: Vec<&str> = text.split('\t').collect();
        if fields.len() != 5 {
            return Err(LoadError::Parse {
                line,
                reason: format!("expected 5 columns, found {}", fields.len()),
            });
        }
        rows.push(parse_combo_row(&fields, line)?);
    }
    Ok(crate::study::group_studies(rows))
}

pub fn load_qn_file(path: &Path) -> Result<Vec<StudyRecord>, LoadError> {
    let file = File::open(path)?;
    let studies = parse_qn_records(BufReader::new(file))?;
    log::info!("Loaded {} studies from {}", studies.len(), path.display());
    Ok(studies)
}

// ---------------------------------------------------------------------------
// Sampler output
// ---------------------------------------------------------------------------

/// Parse sampler output back into one dataset per study.
///
/// Every row must carry the same number of sampled variances.
pub fn parse_variance_rows<R: BufRead>(reader: R) -> Result<Vec<StudyVarianceDataset>, LoadError> {
    let mut datasets: Vec<StudyVarianceDataset> = Vec::new();
    let mut width: Option<usize> = None;

    for entry in data_lines(reader) {
        let (line, text) = entry?;
        let fields: Vec<&str> = text.split('\t').collect();
        let row = parse_combo_row(&fields, line)?;

        let variances = fields[5.min(fields.len())..]
            .iter()
            .enumerate()
            .map(|(i, raw)| {
                raw.trim().parse::<f64>().map_err(|_| LoadError::Parse {
                    line,
                    reason: format!("invalid variance in column {}: {raw:?}", i + 6),
                })
            })
            .collect::<Result<Vec<f64>, _>>()?;

        match width {
            None if variances.is_empty() => {
                return Err(LoadError::Parse {
                    line,
                    reason: "no sampled variances".to_string(),
                });
            }
            None => width = Some(variances.len()),
            Some(w) if w != variances.len() => {
                return Err(LoadError::Parse {
                    line,
                    reason: format!("expected {w} sampled variances, found {}", variances.len()),
                });
            }
            Some(_) => {}
        }

        let combo = ComboVariances {
            combo: row.combo,
            variances,
        };
        match datasets.iter_mut().find(|d| d.study_id == row.study) {
            Some(dataset) => dataset.rows.push(combo),
            None => datasets.push(StudyVarianceDataset {
                study_id: row.study,
                sample_size: combo.variances.len(),
                rows: vec![combo],
            }),
        }
    }
    Ok(datasets)
}

pub fn load_variance_file(path: &Path) -> Result<Vec<StudyVarianceDataset>, LoadError> {
    let file = File::open(path)?;
    parse_variance_rows(BufReader::new(file))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    // -----------------------------------------------------------------------
    // Study summary tests
    // -----------------------------------------------------------------------

    #[test]
    fn test_parse_qn_records_groups_by_study() {
        let text = "# study\tQ\tN\tmean\tvar\n\
                    bbs_1\t30\t5\t6.0\t4.5\n\
                    \n\
                    bbs_1\t40\t4\t10.0\t12.0\n\
                    gentry_2\t12\t3\t4.0\t1.0\n";
        let studies = parse_qn_records(Cursor::new(text)).unwrap();
        assert_eq!(studies.len(), 2);
        assert_eq!(studies[0].id, "bbs_1");
        assert_eq!(studies[0].combos.len(), 2);
        assert_eq!(studies[0].combos[1], QnCombo::new(40, 4, 10.0, 12.0));
        assert_eq!(studies[1].id, "gentry_2");
    }

    #[test]
    fn test_parse_qn_records_reports_line_numbers() {
        let text = "a\t10\t3\t3.3\t1.0\n\na\tten\t3\t3.3\t1.0\n";
        match parse_qn_records(Cursor::new(text)) {
            Err(LoadError::Parse { line, reason }) => {
                assert_eq!(line, 3);
                assert!(reason.contains("Q"), "{reason}");
            }
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_qn_records_rejects_wrong_width() {
        let err = parse_qn_records(Cursor::new("a\t10\t3\t3.3\n")).unwrap_err();
        assert!(matches!(err, LoadError::Parse { line: 1, .. }));
    }

    #[test]
    fn test_load_qn_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("qn.txt");
        std::fs::write(&path, "s\t9\t3\t3.0\t0.0\n").unwrap();
        let studies = load_qn_file(&path).unwrap();
        assert_eq!(studies[0].combos[0].q, 9);
        assert!(matches!(
            load_qn_file(&tmp.path().join("nope.txt")),
            Err(LoadError::Io(_))
        ));
    }

    // -----------------------------------------------------------------------
    // Sampler output tests
    // -----------------------------------------------------------------------

    #[test]
    fn test_parse_variance_rows() {
        let text = "s1\t10\t3\t3.5\t2.25\t1\t2\t3\n\
                    s1\t20\t4\t5\t4\t0\t4.5\t9\n\
                    s2\t12\t3\t4\t1\t0.5\t1.5\t2.5\n";
        let datasets = parse_variance_rows(Cursor::new(text)).unwrap();
        assert_eq!(datasets.len(), 2);
        assert_eq!(datasets[0].sample_size, 3);
        assert_eq!(datasets[0].rows.len(), 2);
        assert_eq!(datasets[0].rows[1].variances, vec![0.0, 4.5, 9.0]);
        assert_eq!(datasets[1].replicate(2), vec![2.5]);
    }

    #[test]
    fn test_parse_variance_rows_rejects_ragged_rows() {
        let text = "s1\t10\t3\t3.5\t2.25\t1\t2\t3\ns1\t20\t4\t5\t4\t0\t4.5\n";
        let err = parse_variance_rows(Cursor::new(text)).unwrap_err();
        assert!(matches!(err, LoadError::Parse { line: 2, .. }));
    }

    #[test]
    fn test_parse_variance_rows_requires_samples() {
        let err = parse_variance_rows(Cursor::new("s1\t10\t3\t3.5\t2.25\n")).unwrap_err();
        assert!(matches!(err, LoadError::Parse { line: 1, .. }));
    }
}
