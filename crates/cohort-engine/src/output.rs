//! Run output files.
//!
//! Everything a run produces is written below `<output_dir>/<run_id>/`:
//!
//! - `summary.json` -- run name, seed, end reason, and step summaries
//! - `analytics.json` -- the end-of-run analytics report
//! - `contingency.json` / `contingency.tsv` -- contingency table rows, when
//!   tables are enabled

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::info;

use cohort_core::runner::{SimulationResult, TickCallback};
use cohort_core::tick::{SimulationState, TickSummary};
use cohort_tree::ContingencyRow;

use crate::error::EngineError;

/// Collects every step summary for `summary.json`.
#[derive(Debug, Default)]
pub struct StepLog {
    /// Summaries in step order.
    pub steps: Vec<TickSummary>,
}

impl TickCallback for StepLog {
    fn on_tick(&mut self, summary: &TickSummary, _state: &SimulationState) {
        self.steps.push(summary.clone());
    }
}

/// Contents of `summary.json`.
#[derive(Debug, Serialize)]
pub struct RunSummary<'a> {
    /// Human-readable run name.
    pub name: &'a str,
    /// Run identifier.
    pub run_id: &'a str,
    /// Random seed used.
    pub seed: u64,
    /// How the run ended.
    pub result: &'a SimulationResult,
    /// Every completed step.
    pub steps: &'a [TickSummary],
}

/// Directory of one run's output files.
#[derive(Debug, Clone)]
pub struct RunOutput {
    dir: PathBuf,
}

impl RunOutput {
    /// Create `<output_dir>/<run_id>/`.
    pub fn create(output_dir: &Path, run_id: &str) -> Result<Self, EngineError> {
        let dir = output_dir.join(run_id);
        fs::create_dir_all(&dir).map_err(|source| EngineError::Output {
            path: dir.clone(),
            source,
        })?;
        Ok(Self { dir })
    }

    /// The run directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write `value` as pretty JSON to `name` in the run directory.
    pub fn write_json<T: Serialize>(&self, name: &str, value: &T) -> Result<PathBuf, EngineError> {
        let path = self.dir.join(name);
        let mut writer = BufWriter::new(self.create_file(&path)?);
        serde_json::to_writer_pretty(&mut writer, value).map_err(|source| {
            EngineError::Serialize {
                path: path.clone(),
                source,
            }
        })?;
        writer.flush().map_err(|source| EngineError::Output {
            path: path.clone(),
            source,
        })?;
        info!(path = %path.display(), "Wrote output");
        Ok(path)
    }

    /// Write contingency rows as tab-separated text to `name`.
    pub fn write_rows_tsv(&self, name: &str, rows: &[ContingencyRow]) -> Result<PathBuf, EngineError> {
        let path = self.dir.join(name);
        let mut writer = BufWriter::new(self.create_file(&path)?);
        cohort_tree::rows::write_tsv(rows, &mut writer)
            .and_then(|()| writer.flush())
            .map_err(|source| EngineError::Output {
                path: path.clone(),
                source,
            })?;
        info!(path = %path.display(), rows = rows.len(), "Wrote output");
        Ok(path)
    }

    fn create_file(&self, path: &Path) -> Result<File, EngineError> {
        File::create(path).map_err(|source| EngineError::Output {
            path: path.to_path_buf(),
            source,
        })
    }
}
