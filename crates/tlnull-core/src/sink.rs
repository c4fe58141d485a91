//! Append-only destinations for completed study datasets.
//!
//! A sink only ever sees complete datasets: the builder never hands over a
//! study with a truncated combo. File sinks open their target in append mode
//! and never truncate what earlier runs wrote.

use std::fmt::Write as _;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use tlnull_stats::summarize_null;

use crate::sampler::AnalysisMode;
use crate::study::{QnCombo, StudyVarianceDataset};

/// Receives one dataset per completed study.
pub trait VarianceSink {
    fn append(&mut self, dataset: &StudyVarianceDataset) -> io::Result<()>;
}

// ---------------------------------------------------------------------------
// File names
// ---------------------------------------------------------------------------

/// Full per-replicate variances: `taylor_QN_var_predicted_<mode>_full.txt`.
pub fn full_variance_file_name(mode: AnalysisMode) -> String {
    format!("taylor_QN_var_predicted_{mode}_full.txt")
}

/// Per-combo null summaries: `taylor_QN_var_predicted_<mode>.txt`.
pub fn summary_file_name(mode: AnalysisMode) -> String {
    format!("taylor_QN_var_predicted_{mode}.txt")
}

fn open_append(path: &Path) -> io::Result<BufWriter<File>> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    Ok(BufWriter::new(file))
}

fn write_combo_prefix(line: &mut String, study: &str, combo: &QnCombo) {
    // Writing into a String cannot fail.
    let _ = write!(
        line,
        "{study}\t{}\t{}\t{}\t{}",
        combo.q, combo.n, combo.mean, combo.var
    );
}

// ---------------------------------------------------------------------------
// In-memory sink
// ---------------------------------------------------------------------------

/// Keeps every dataset it receives.
#[derive(Debug, Default)]
pub struct MemorySink {
    datasets: Vec<StudyVarianceDataset>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn datasets(&self) -> &[StudyVarianceDataset] {
        &self.datasets
    }

    pub fn into_inner(self) -> Vec<StudyVarianceDataset> {
        self.datasets
    }
}

impl VarianceSink for MemorySink {
    fn append(&mut self, dataset: &StudyVarianceDataset) -> io::Result<()> {
        self.datasets.push(dataset.clone());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Full variance file
// ---------------------------------------------------------------------------

/// One tab-delimited row per combo: `study Q N mean var v1 .. vk`.
pub struct FileSink {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl FileSink {
    /// Open (or create) the full variance file for `mode` inside `dir`.
    pub fn create(dir: &Path, mode: AnalysisMode) -> io::Result<Self> {
        Self::at(dir.join(full_variance_file_name(mode)))
    }

    pub fn at(path: PathBuf) -> io::Result<Self> {
        let writer = open_append(&path)?;
        Ok(Self { path, writer })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl VarianceSink for FileSink {
    fn append(&mut self, dataset: &StudyVarianceDataset) -> io::Result<()> {
        for row in &dataset.rows {
            let mut line = String::new();
            write_combo_prefix(&mut line, &dataset.study_id, &row.combo);
            for v in &row.variances {
                let _ = write!(line, "\t{v}");
            }
            writeln!(self.writer, "{line}")?;
        }
        self.writer.flush()
    }
}

// ---------------------------------------------------------------------------
// Summary file
// ---------------------------------------------------------------------------

/// One row per combo: `study Q N mean median p2.5 p97.5` of the null sample.
pub struct SummarySink {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl SummarySink {
    pub fn create(dir: &Path, mode: AnalysisMode) -> io::Result<Self> {
        let path = dir.join(summary_file_name(mode));
        let writer = open_append(&path)?;
        Ok(Self { path, writer })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl VarianceSink for SummarySink {
    fn append(&mut self, dataset: &StudyVarianceDataset) -> io::Result<()> {
        for row in &dataset.rows {
            let s = summarize_null(&row.variances);
            writeln!(
                self.writer,
                "{}\t{}\t{}\t{}\t{}\t{}\t{}",
                dataset.study_id, row.combo.q, row.combo.n, s.mean, s.median, s.lower, s.upper
            )?;
        }
        self.writer.flush()
    }
}

// ---------------------------------------------------------------------------
// Fan-out
// ---------------------------------------------------------------------------

/// Forwards each dataset to every inner sink, in order. Stops at the first
/// failing sink.
#[derive(Default)]
pub struct TeeSink {
    sinks: Vec<Box<dyn VarianceSink>>,
}

impl TeeSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: impl VarianceSink + 'static) -> Self {
        self.sinks.push(Box::new(sink));
        self
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl VarianceSink for TeeSink {
    fn append(&mut self, dataset: &StudyVarianceDataset) -> io::Result<()> {
        for sink in &mut self.sinks {
            sink.append(dataset)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::study::ComboVariances;

    fn dataset(id: &str) -> StudyVarianceDataset {
        StudyVarianceDataset {
            study_id: id.to_string(),
            sample_size: 3,
            rows: vec![
                ComboVariances {
                    combo: QnCombo::new(10, 3, 3.5, 2.25),
                    variances: vec![1.0, 2.0, 3.0],
                },
                ComboVariances {
                    combo: QnCombo::new(20, 4, 5.0, 4.0),
                    variances: vec![0.0, 4.5, 9.0],
                },
            ],
        }
    }

    #[test]
    fn test_file_names() {
        assert_eq!(
            full_variance_file_name(AnalysisMode::Partition),
            "taylor_QN_var_predicted_partition_full.txt"
        );
        assert_eq!(
            summary_file_name(AnalysisMode::Composition),
            "taylor_QN_var_predicted_composition.txt"
        );
    }

    #[test]
    fn test_memory_sink_keeps_datasets() {
        let mut sink = MemorySink::new();
        sink.append(&dataset("a")).unwrap();
        sink.append(&dataset("b")).unwrap();
        assert_eq!(sink.datasets().len(), 2);
        assert_eq!(sink.into_inner()[1].study_id, "b");
    }

    #[test]
    fn test_file_sink_writes_one_row_per_combo() {
        let tmp = tempfile::tempdir().unwrap();
        let mut sink = FileSink::create(tmp.path(), AnalysisMode::Partition).unwrap();
        sink.append(&dataset("s1")).unwrap();
        let text = fs::read_to_string(sink.path()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines, vec!["s1\t10\t3\t3.5\t2.25\t1\t2\t3", "s1\t20\t4\t5\t4\t0\t4.5\t9"]);
    }

    #[test]
    fn test_file_sink_appends_across_opens() {
        let tmp = tempfile::tempdir().unwrap();
        {
            let mut sink = FileSink::create(tmp.path(), AnalysisMode::Composition).unwrap();
            sink.append(&dataset("first")).unwrap();
        }
        let mut sink = FileSink::create(tmp.path(), AnalysisMode::Composition).unwrap();
        sink.append(&dataset("second")).unwrap();
        let text = fs::read_to_string(sink.path()).unwrap();
        assert_eq!(text.lines().count(), 4);
        assert!(text.starts_with("first\t"));
    }

    #[test]
    fn test_file_sink_creates_missing_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("nested").join("out");
        let sink = FileSink::create(&dir, AnalysisMode::Partition).unwrap();
        assert!(sink.path().exists());
    }

    #[test]
    fn test_summary_sink_rows() {
        let tmp = tempfile::tempdir().unwrap();
        let mut sink = SummarySink::create(tmp.path(), AnalysisMode::Partition).unwrap();
        sink.append(&dataset("s1")).unwrap();
        let text = fs::read_to_string(sink.path()).unwrap();
        let first: Vec<&str> = text.lines().next().unwrap().split('\t').collect();
        assert_eq!(&first[..3], &["s1", "10", "3"]);
        assert_eq!(first[3].parse::<f64>().unwrap(), 2.0);
        assert_eq!(first[4].parse::<f64>().unwrap(), 2.0);
        assert!((first[5].parse::<f64>().unwrap() - 1.05).abs() < 1e-9);
        assert!((first[6].parse::<f64>().unwrap() - 2.95).abs() < 1e-9);
    }

    #[test]
    fn test_tee_sink_fans_out() {
        let tmp = tempfile::tempdir().unwrap();
        let full = FileSink::create(tmp.path(), AnalysisMode::Partition).unwrap();
        let summary = SummarySink::create(tmp.path(), AnalysisMode::Partition).unwrap();
        let full_path = full.path().to_path_buf();
        let summary_path = summary.path().to_path_buf();
        let mut tee = TeeSink::new().with(full).with(summary);
        assert_eq!(tee.len(), 2);
        tee.append(&dataset("s1")).unwrap();
        assert_eq!(fs::read_to_string(full_path).unwrap().lines().count(), 2);
        assert_eq!(fs::read_to_string(summary_path).unwrap().lines().count(), 2);
    }
}
