//! Run manifests.
//!
//! Each sampling run leaves one JSON manifest next to its output files,
//! recording what was run, with which configuration, and what came out.
//!
//! # Storage Format
//!
//! `run_<mode>_<timestamp>_<id prefix>.json` in the output directory, holding
//! a serialized [`RunManifest`]. Output files themselves are append-only and
//! shared between runs, so the manifest is the only per-run artifact.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime};

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::builder::RunSummary;
use crate::config::RunConfig;

// ---------------------------------------------------------------------------
// Manifest (run_*.json)
// ---------------------------------------------------------------------------

/// Metadata written once a run finishes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunManifest {
    pub version: u32,
    pub id: String,
    pub started_at: String,
    pub ended_at: String,
    pub duration_ms: u64,
    pub mode: String,
    pub input: Option<String>,
    pub outputs: Vec<String>,
    pub config: RunConfig,
    pub summary: RunSummary,
    pub tlnull_version: String,
}

impl RunManifest {
    pub fn load(path: &Path) -> io::Result<Self> {
        let text = fs::read_to_string(path)?;
        serde_json::from_str(&text).map_err(io::Error::other)
    }
}

// ---------------------------------------------------------------------------
// Recorder
// ---------------------------------------------------------------------------

/// Tracks one run from start to [`RunRecorder::finish`].
pub struct RunRecorder {
    id: String,
    started_at: SystemTime,
    started_instant: Instant,
    config: RunConfig,
    input: Option<PathBuf>,
    outputs: Vec<PathBuf>,
}

impl RunRecorder {
    /// Start recording a run with `config`.
    pub fn start(config: RunConfig) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            started_at: SystemTime::now(),
            started_instant: Instant::now(),
            config,
            input: None,
            outputs: Vec::new(),
        }
    }

    pub fn with_input(mut self, path: &Path) -> Self {
        self.input = Some(path.to_path_buf());
        self
    }

    pub fn add_output(&mut self, path: &Path) {
        self.outputs.push(path.to_path_buf());
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn elapsed(&self) -> Duration {
        self.started_instant.elapsed()
    }

    /// Build the manifest for a finished run without writing it.
    pub fn manifest(&self, summary: RunSummary) -> RunManifest {
        RunManifest {
            version: 1,
            id: self.id.clone(),
            started_at: rfc3339(self.started_at),
            ended_at: rfc3339(SystemTime::now()),
            duration_ms: self.elapsed().as_millis() as u64,
            mode: self.config.sampling.mode.to_string(),
            input: self.input.as_ref().map(|p| p.display().to_string()),
            outputs: self.outputs.iter().map(|p| p.display().to_string()).collect(),
            config: self.config.clone(),
            summary,
            tlnull_version: crate::VERSION.to_string(),
        }
    }

    /// Write the manifest into `dir` and return its path.
    pub fn finish(self, dir: &Path, summary: RunSummary) -> io::Result<PathBuf> {
        let manifest = self.manifest(summary);
        let name = format!(
            "run_{}_{}_{}.json",
            manifest.mode,
            file_stamp(self.started_at),
            &self.id[..8]
        );

        fs::create_dir_all(dir)?;
        let path = dir.join(name);
        let json = serde_json::to_string_pretty(&manifest).map_err(io::Error::other)?;
        fs::write(&path, json)?;
        log::info!("Run manifest written to {}", path.display());
        Ok(path)
    }
}

// ---------------------------------------------------------------------------
// Timestamps
// ---------------------------------------------------------------------------

/// Compact UTC timestamp for file names, e.g. `2026-02-15T013000Z`.
fn file_stamp(at: SystemTime) -> String {
    DateTime::<Utc>::from(at).format("%Y-%m-%dT%H%M%SZ").to_string()
}

/// RFC 3339 UTC timestamp at second precision, e.g. `2026-02-15T01:30:00Z`.
fn rfc3339(at: SystemTime) -> String {
    DateTime::<Utc>::from(at).to_rfc3339_opts(SecondsFormat::Secs, true)
}
