//! Parsing of per-run simulator tables.

use std::collections::HashSet;
use std::path::Path;

use csv::{ReaderBuilder, StringRecord, Trim};
use fairbench_core::errors::{BenchError, ErrorInfo};

/// Default name of the time key column.
pub const DEFAULT_TIME_COLUMN: &str = "Time";

/// One row of a run table.
#[derive(Debug, Clone, PartialEq)]
pub struct RunRow {
    /// Time key of the row.
    pub time: f64,
    /// One cell per value column; `None` for empty or non-numeric cells.
    pub values: Vec<Option<f64>>,
}

/// Parsed output of one simulator run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunTable {
    columns: Vec<String>,
    numeric: Vec<bool>,
    rows: Vec<RunRow>,
}

impl RunTable {
    /// Builds a table from in-memory parts.
    ///
    /// `numeric[i]` is false when column `i` held a non-numeric cell.
    pub fn from_parts(columns: Vec<String>, numeric: Vec<bool>, rows: Vec<RunRow>) -> Self {
        Self {
            columns,
            numeric,
            rows,
        }
    }

    /// Reads a comma separated run table keyed by `time_column`.
    ///
    /// `#` lines are ignored and fields are trimmed. Ragged rows, a missing
    /// time column, duplicated headers and non-numeric time keys make the
    /// whole file invalid. Rows with an empty or NaN time key are dropped.
    pub fn read(path: &Path, time_column: &str) -> Result<Self, BenchError> {
        let mut reader = ReaderBuilder::new()
            .comment(Some(b'#'))
            .trim(Trim::All)
            .from_path(path)
            .map_err(|err| data_error("run_open", path, err))?;
        let headers = reader
            .headers()
            .map_err(|err| data_error("run_header", path, err))?
            .clone();
        let time_idx = header_layout(&headers, time_column, path)?;

        let columns: Vec<String> = headers
            .iter()
            .enumerate()
            .filter(|(idx, _)| *idx != time_idx)
            .map(|(_, name)| name.to_string())
            .collect();
        let mut numeric = vec![true; columns.len()];
        let mut rows = Vec::new();
        let mut record = StringRecord::new();
        loop {
            match reader.read_record(&mut record) {
                Ok(true) => {}
                Ok(false) => break,
                Err(err) => return Err(data_error("run_record", path, err)),
            }
            let raw_time = record.get(time_idx).unwrap_or_default();
            if raw_time.is_empty() {
                continue;
            }
            let time: f64 = raw_time.parse().map_err(|_| {
                BenchError::Data(
                    ErrorInfo::new("non_numeric_time", "time key is not a number")
                        .with_context("path", path.display().to_string())
                        .with_context("value", raw_time),
                )
            })?;
            if time.is_nan() {
                continue;
            }
            let mut values = Vec::with_capacity(columns.len());
            for (slot, cell) in record
                .iter()
                .enumerate()
                .filter(|(idx, _)| *idx != time_idx)
                .map(|(_, cell)| cell)
                .enumerate()
            {
                if cell.is_empty() {
                    values.push(None);
                    continue;
                }
                match cell.parse::<f64>() {
                    Ok(value) if value.is_nan() => values.push(None),
                    Ok(value) => values.push(Some(value)),
                    Err(_) => {
                        numeric[slot] = false;
                        values.push(None);
                    }
                }
            }
            rows.push(RunRow { time, values });
        }
        Ok(Self {
            columns,
            numeric,
            rows,
        })
    }

    /// Value column names, time column excluded.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Whether column `idx` held only numeric or empty cells.
    pub fn is_numeric(&self, idx: usize) -> bool {
        self.numeric.get(idx).copied().unwrap_or(false)
    }

    /// Rows in file order.
    pub fn rows(&self) -> &[RunRow] {
        &self.rows
    }
}

fn header_layout(headers: &StringRecord, time_column: &str, path: &Path) -> Result<usize, BenchError> {
    let mut seen = HashSet::new();
    for name in headers.iter() {
        if !seen.insert(name) {
            return Err(BenchError::Data(
                ErrorInfo::new("duplicate_column", "run table repeats a column name")
                    .with_context("path", path.display().to_string())
                    .with_context("column", name),
            ));
        }
    }
    headers
        .iter()
        .position(|name| name == time_column)
        .ok_or_else(|| {
            BenchError::Data(
                ErrorInfo::new("missing_time_column", "run table has no time column")
                    .with_context("path", path.display().to_string())
                    .with_context("column", time_column),
            )
        })
}

fn data_error(code: &str, path: &Path, err: csv::Error) -> BenchError {
    BenchError::Data(
        ErrorInfo::new(code, err.to_string()).with_context("path", path.display().to_string()),
    )
}
