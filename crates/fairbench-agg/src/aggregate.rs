//! Element-wise averaging of the run tables of one experiment.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use csv::WriterBuilder;
use fairbench_core::errors::{BenchError, ErrorInfo};
use fairbench_core::{parse_run_file_name, ResultLayout};
use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::report::{AggregationReport, ExperimentOutcome, SkippedRun};
use crate::sum::ExactSum;
use crate::table::{RunTable, DEFAULT_TIME_COLUMN};

/// Averaged series of one experiment.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregatedTable {
    /// Name of the time key column.
    pub time_column: String,
    /// Numeric value columns in first-seen order.
    pub columns: Vec<String>,
    /// One row per distinct time key, in first-seen order.
    pub rows: Vec<AggregatedRow>,
}

/// One averaged row.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregatedRow {
    /// Time key.
    pub time: f64,
    /// Mean per column; `None` when no run reported the cell.
    pub values: Vec<Option<f64>>,
}

impl AggregatedTable {
    /// Header followed by one line per row.
    pub fn to_csv_bytes(&self) -> Result<Vec<u8>, BenchError> {
        let mut writer = WriterBuilder::new().from_writer(Vec::new());
        self.write_records(&mut writer)?;
        writer
            .into_inner()
            .map_err(|err| write_error("aggregate_flush", err.to_string()))
    }

    /// Writes the table to `path`, replacing any previous file atomically.
    pub fn write_csv(&self, path: &Path) -> Result<(), BenchError> {
        let staging = staging_path(path);
        let file =
            File::create(&staging).map_err(|err| BenchError::io("aggregate_create", &staging, err))?;
        let mut writer = WriterBuilder::new().from_writer(BufWriter::new(file));
        self.write_records(&mut writer)?;
        writer
            .flush()
            .map_err(|err| BenchError::io("aggregate_flush", &staging, err))?;
        drop(writer);
        fs::rename(&staging, path).map_err(|err| BenchError::io("aggregate_rename", path, err))
    }

    fn write_records<W: std::io::Write>(&self, writer: &mut csv::Writer<W>) -> Result<(), BenchError> {
        let header = std::iter::once(self.time_column.as_str())
            .chain(self.columns.iter().map(String::as_str));
        writer
            .write_record(header)
            .map_err(|err| write_error("aggregate_header", err.to_string()))?;
        for row in &self.rows {
            let record = std::iter::once(format_value(row.time)).chain(
                row.values
                    .iter()
                    .map(|value| value.map(format_value).unwrap_or_default()),
            );
            writer
                .write_record(record)
                .map_err(|err| write_error("aggregate_row", err.to_string()))?;
        }
        Ok(())
    }
}

/// Result of aggregating one experiment directory.
#[derive(Debug, Clone, PartialEq)]
pub enum Aggregate {
    /// No readable run table was found.
    Empty,
    /// Averaged series, possibly with zero rows.
    Table(AggregatedTable),
}

impl Aggregate {
    /// The averaged table, if any.
    pub fn table(&self) -> Option<&AggregatedTable> {
        match self {
            Aggregate::Empty => None,
            Aggregate::Table(table) => Some(table),
        }
    }
}

/// Aggregate of one experiment plus the runs that went into it.
#[derive(Debug, Clone, PartialEq)]
pub struct ExperimentAggregate {
    /// Experiment directory name.
    pub experiment: String,
    /// Run tables folded into the result.
    pub runs_used: usize,
    /// Run tables that could not be read.
    pub skipped: Vec<SkippedRun>,
    /// Averaged series.
    pub result: Aggregate,
}

/// Averages repeated runs over a shared time key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeriesAggregator {
    time_column: String,
    max_runs: Option<u32>,
}

impl Default for SeriesAggregator {
    fn default() -> Self {
        Self::new(DEFAULT_TIME_COLUMN)
    }
}

impl SeriesAggregator {
    /// Aggregator keyed on `time_column`.
    pub fn new(time_column: impl Into<String>) -> Self {
        Self {
            time_column: time_column.into(),
            max_runs: None,
        }
    }

    /// Ignores run tables numbered above `repetitions`, such as leftovers of
    /// an earlier pass with a larger plan.
    pub fn with_max_runs(mut self, repetitions: u32) -> Self {
        self.max_runs = Some(repetitions);
        self
    }

    /// Name of the time key column.
    pub fn time_column(&self) -> &str {
        &self.time_column
    }

    /// Averages every `run_NNN.csv` under `experiment_dir`, visiting files in
    /// run order.
    ///
    /// Unreadable runs are skipped and listed in the result. A directory with
    /// no usable run yields [`Aggregate::Empty`]. A missing directory is a
    /// data error.
    pub fn aggregate(&self, experiment_dir: &Path) -> Result<ExperimentAggregate, BenchError> {
        let experiment = experiment_name(experiment_dir);
        let mut runs = list_run_tables(experiment_dir)?;
        if let Some(limit) = self.max_runs {
            let before = runs.len();
            runs.retain(|(run, _)| *run <= limit);
            if runs.len() < before {
                info!(experiment = %experiment, ignored = before - runs.len(), limit, "ignoring run tables beyond the plan's repetitions");
            }
        }
        let mut fold = Accumulator::new(&self.time_column);
        let mut runs_used = 0usize;
        let mut skipped = Vec::new();
        for (_, path) in runs {
            match RunTable::read(&path, &self.time_column) {
                Ok(table) => {
                    fold.add(&table);
                    runs_used += 1;
                }
                Err(err) => {
                    warn!(experiment = %experiment, path = %path.display(), error = %err, "skipping run table");
                    skipped.push(SkippedRun {
                        experiment: experiment.clone(),
                        path,
                        reason: err.to_string(),
                    });
                }
            }
        }
        let result = if runs_used == 0 {
            Aggregate::Empty
        } else {
            Aggregate::Table(fold.finish())
        };
        debug!(experiment = %experiment, runs_used, skipped = skipped.len(), "experiment aggregated");
        Ok(ExperimentAggregate {
            experiment,
            runs_used,
            skipped,
            result,
        })
    }

    /// Folds already parsed tables in iteration order.
    pub fn aggregate_tables<'a, I>(&self, tables: I) -> Aggregate
    where
        I: IntoIterator<Item = &'a RunTable>,
    {
        let mut fold = Accumulator::new(&self.time_column);
        let mut used = 0usize;
        for table in tables {
            fold.add(table);
            used += 1;
        }
        if used == 0 {
            Aggregate::Empty
        } else {
            Aggregate::Table(fold.finish())
        }
    }

    /// Aggregates every experiment directory under `root` in parallel and
    /// writes `avg_<experiment>.csv` next to `root`.
    pub fn aggregate_all(&self, root: &Path) -> Result<AggregationReport, BenchError> {
        let layout = ResultLayout::new(root);
        let mut experiments: Vec<PathBuf> = fs::read_dir(root)
            .map_err(|err| missing_dir("missing_results_root", root, err))?
            .filter_map(|entry| entry.ok().map(|entry| entry.path()))
            .filter(|path| path.is_dir())
            .collect();
        experiments.sort();
        info!(root = %root.display(), experiments = experiments.len(), "aggregating results");

        let outcomes: Vec<ExperimentOutcome> = experiments
            .par_iter()
            .map(|dir| self.aggregate_into(dir, &layout))
            .collect();
        let report = AggregationReport::from_outcomes(outcomes);
        info!(
            written = report.written.len(),
            empty = report.empty.len(),
            failed = report.failed.len(),
            skipped_runs = report.skipped_runs.len(),
            "aggregation pass finished"
        );
        Ok(report)
    }

    fn aggregate_into(&self, dir: &Path, layout: &ResultLayout) -> ExperimentOutcome {
        let aggregate = match self.aggregate(dir) {
            Ok(aggregate) => aggregate,
            Err(err) => {
                warn!(dir = %dir.display(), error = %err, "skipping experiment");
                return ExperimentOutcome::Failed {
                    experiment: experiment_name(dir),
                    reason: err.to_string(),
                };
            }
        };
        let ExperimentAggregate {
            experiment,
            runs_used,
            skipped,
            result,
        } = aggregate;
        match result {
            Aggregate::Empty => {
                warn!(experiment = %experiment, "no usable run tables");
                ExperimentOutcome::Empty {
                    experiment,
                    skipped,
                }
            }
            Aggregate::Table(table) => {
                let path = layout.aggregate_path(&experiment);
                match table.write_csv(&path) {
                    Ok(()) => {
                        info!(experiment = %experiment, runs_used, rows = table.rows.len(), path = %path.display(), "wrote aggregate");
                        ExperimentOutcome::Written {
                            experiment,
                            path,
                            runs_used,
                            rows: table.rows.len(),
                            skipped,
                        }
                    }
                    Err(err) => {
                        warn!(experiment = %experiment, error = %err, "cannot write aggregate");
                        ExperimentOutcome::Failed {
                            experiment,
                            reason: err.to_string(),
                        }
                    }
                }
            }
        }
    }
}

/// Shortest round-trip rendering that keeps `.0` on integral values.
pub fn format_value(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e16 {
        format!("{value:.1}")
    } else {
        format!("{value}")
    }
}

/// Exact sum and count per (time key, column), filled one run at a time.
struct Accumulator {
    time_column: String,
    columns: Vec<String>,
    column_index: HashMap<String, usize>,
    dropped: Vec<bool>,
    times: Vec<f64>,
    time_index: HashMap<u64, usize>,
    sums: Vec<Vec<ExactSum>>,
    counts: Vec<Vec<u32>>,
}

impl Accumulator {
    fn new(time_column: &str) -> Self {
        Self {
            time_column: time_column.to_string(),
            columns: Vec::new(),
            column_index: HashMap::new(),
            dropped: Vec::new(),
            times: Vec::new(),
            time_index: HashMap::new(),
            sums: Vec::new(),
            counts: Vec::new(),
        }
    }

    fn add(&mut self, table: &RunTable) {
        let slots: Vec<usize> = table
            .columns()
            .iter()
            .enumerate()
            .map(|(idx, name)| {
                let slot = self.column_slot(name);
                if !table.is_numeric(idx) {
                    self.dropped[slot] = true;
                }
                slot
            })
            .collect();
        for row in table.rows() {
            let row_idx = self.row_slot(row.time);
            let width = self.columns.len();
            let sums = &mut self.sums[row_idx];
            let counts = &mut self.counts[row_idx];
            if sums.len() < width {
                sums.resize_with(width, ExactSum::default);
                counts.resize(width, 0);
            }
            for (value, &slot) in row.values.iter().zip(&slots) {
                if let Some(value) = value {
                    sums[slot].add(*value);
                    counts[slot] += 1;
                }
            }
        }
    }

    fn column_slot(&mut self, name: &str) -> usize {
        if let Some(&slot) = self.column_index.get(name) {
            return slot;
        }
        let slot = self.columns.len();
        self.columns.push(name.to_string());
        self.column_index.insert(name.to_string(), slot);
        self.dropped.push(false);
        slot
    }

    fn row_slot(&mut self, time: f64) -> usize {
        // -0.0 and 0.0 are the same key
        let time = if time == 0.0 { 0.0 } else { time };
        let next = self.times.len();
        let slot = *self.time_index.entry(time.to_bits()).or_insert(next);
        if slot == next {
            self.times.push(time);
            self.sums.push(Vec::new());
            self.counts.push(Vec::new());
        }
        slot
    }

    fn finish(self) -> AggregatedTable {
        let kept: Vec<usize> = (0..self.columns.len())
            .filter(|&slot| !self.dropped[slot])
            .collect();
        let rows = self
            .times
            .iter()
            .enumerate()
            .map(|(row_idx, &time)| AggregatedRow {
                time,
                values: kept
                    .iter()
                    .map(|&slot| {
                        let count = self.counts[row_idx].get(slot).copied().unwrap_or(0);
                        (count > 0).then(|| self.sums[row_idx][slot].value() / f64::from(count))
                    })
                    .collect(),
            })
            .collect();
        AggregatedTable {
            time_column: self.time_column,
            columns: kept.iter().map(|&slot| self.columns[slot].clone()).collect(),
            rows,
        }
    }
}

fn list_run_tables(dir: &Path) -> Result<Vec<(u32, PathBuf)>, BenchError> {
    let mut runs: Vec<(u32, PathBuf)> = fs::read_dir(dir)
        .map_err(|err| missing_dir("missing_experiment", dir, err))?
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| {
            let run = entry.file_name().to_str().and_then(parse_run_file_name)?;
            Some((run, entry.path()))
        })
        .filter(|(_, path)| path.is_file())
        .collect();
    runs.sort();
    Ok(runs)
}

fn experiment_name(dir: &Path) -> String {
    dir.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| dir.display().to_string())
}

fn staging_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".partial");
    path.with_file_name(name)
}

fn missing_dir(code: &str, dir: &Path, err: std::io::Error) -> BenchError {
    BenchError::Data(
        ErrorInfo::new(code, err.to_string()).with_context("path", dir.display().to_string()),
    )
}

fn write_error(code: &str, message: String) -> BenchError {
    BenchError::Io(ErrorInfo::new(code, message))
}
