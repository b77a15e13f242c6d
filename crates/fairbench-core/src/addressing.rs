//! Deterministic mapping from (experiment, run index) to output paths.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::errors::{BenchError, ErrorInfo};
use crate::key::ExperimentKey;

/// Prefix shared by every raw run file.
pub const RUN_FILE_PREFIX: &str = "run_";
/// Prefix of aggregated experiment files.
pub const AGGREGATE_FILE_PREFIX: &str = "avg_";
/// Extension of run and aggregate tables.
pub const TABLE_EXTENSION: &str = "csv";
/// Extension of captured simulator output.
pub const LOG_EXTENSION: &str = "log";

/// Hierarchical results layout rooted at a single directory.
///
/// Raw runs live at `root/<experiment>/run_NNN.csv`; aggregates are written
/// next to the root as `root/../avg_<experiment>.csv`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultLayout {
    root: PathBuf,
}

impl ResultLayout {
    /// Creates a layout rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Results root holding one directory per experiment.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding every run of `key`.
    pub fn experiment_dir(&self, key: &ExperimentKey) -> PathBuf {
        self.root.join(key.name())
    }

    /// Output table of run `run` (1-based) of `key`.
    pub fn run_path(&self, key: &ExperimentKey, run: u32) -> Result<PathBuf, BenchError> {
        Ok(self
            .experiment_dir(key)
            .join(run_file_name(run, TABLE_EXTENSION)?))
    }

    /// Captured stdout/stderr of run `run` of `key`.
    pub fn log_path(&self, key: &ExperimentKey, run: u32) -> Result<PathBuf, BenchError> {
        Ok(self
            .experiment_dir(key)
            .join(run_file_name(run, LOG_EXTENSION)?))
    }

    /// Same as [`ResultLayout::run_path`], creating the experiment directory
    /// when absent. Safe to call concurrently for the same experiment.
    pub fn prepare_run_path(&self, key: &ExperimentKey, run: u32) -> Result<PathBuf, BenchError> {
        let path = self.run_path(key, run)?;
        ensure_dir(&self.experiment_dir(key))?;
        Ok(path)
    }

    /// Directory receiving the `avg_<experiment>.csv` files.
    pub fn aggregate_dir(&self) -> PathBuf {
        match self.root.parent() {
            Some(parent) => parent.to_path_buf(),
            None => self.root.clone(),
        }
    }

    /// Aggregated table path for the experiment called `experiment`.
    pub fn aggregate_path(&self, experiment: &str) -> PathBuf {
        self.aggregate_dir().join(format!(
            "{AGGREGATE_FILE_PREFIX}{experiment}.{TABLE_EXTENSION}"
        ))
    }
}

/// File name of a run artefact, zero padded to three digits.
pub fn run_file_name(run: u32, extension: &str) -> Result<String, BenchError> {
    if run == 0 {
        return Err(BenchError::InvalidKey(
            ErrorInfo::new("invalid_run_index", "run indices start at 1")
                .with_context("run", run.to_string()),
        ));
    }
    Ok(format!("{RUN_FILE_PREFIX}{run:03}.{extension}"))
}

/// Returns the run index encoded in a run table file name, if any.
pub fn parse_run_file_name(file_name: &str) -> Option<u32> {
    let stem = file_name
        .strip_prefix(RUN_FILE_PREFIX)?
        .strip_suffix(TABLE_EXTENSION)?
        .strip_suffix('.')?;
    if stem.is_empty() || !stem.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    stem.parse().ok().filter(|run| *run > 0)
}

/// Create-if-absent that treats a concurrent creator winning the race as success.
pub fn ensure_dir(path: &Path) -> Result<(), BenchError> {
    match fs::create_dir_all(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == ErrorKind::AlreadyExists && path.is_dir() => Ok(()),
        Err(err) => Err(BenchError::io("create_dir", path, err)),
    }
}
