use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// A run table left out of its experiment's aggregate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedRun {
    /// Experiment the run belongs to.
    pub experiment: String,
    /// Path of the run table.
    pub path: PathBuf,
    /// Why the table could not be used.
    pub reason: String,
}

/// What happened to one experiment directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "kebab-case")]
pub enum ExperimentOutcome {
    /// An aggregate file was written.
    Written {
        /// Experiment name.
        experiment: String,
        /// Written `avg_*.csv` file.
        path: PathBuf,
        /// Run tables folded in.
        runs_used: usize,
        /// Distinct time keys.
        rows: usize,
        /// Runs that were left out.
        skipped: Vec<SkippedRun>,
    },
    /// No usable run table; nothing was written.
    Empty {
        /// Experiment name.
        experiment: String,
        /// Runs that were left out.
        skipped: Vec<SkippedRun>,
    },
    /// The directory could not be read or the output not written.
    Failed {
        /// Experiment name.
        experiment: String,
        /// Diagnostic.
        reason: String,
    },
}

/// One written aggregate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WrittenAggregate {
    /// Experiment name.
    pub experiment: String,
    /// Written `avg_*.csv` file.
    pub path: PathBuf,
    /// Run tables folded in.
    pub runs_used: usize,
    /// Distinct time keys.
    pub rows: usize,
}

/// Summary of an aggregation pass over a results root.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AggregationReport {
    /// Experiments with a written aggregate, by name.
    pub written: Vec<WrittenAggregate>,
    /// Experiments without any usable run.
    pub empty: Vec<String>,
    /// Experiments that could not be processed, with the reason.
    pub failed: Vec<(String, String)>,
    /// Every run table that was left out.
    pub skipped_runs: Vec<SkippedRun>,
}

impl AggregationReport {
    /// Collects per-experiment outcomes, keeping their order.
    pub fn from_outcomes(outcomes: Vec<ExperimentOutcome>) -> Self {
        let mut report = Self::default();
        for outcome in outcomes {
            match outcome {
                ExperimentOutcome::Written {
                    experiment,
                    path,
                    runs_used,
                    rows,
                    skipped,
                } => {
                    report.written.push(WrittenAggregate {
                        experiment,
                        path,
                        runs_used,
                        rows,
                    });
                    report.skipped_runs.extend(skipped);
                }
                ExperimentOutcome::Empty {
                    experiment,
                    skipped,
                } => {
                    report.empty.push(experiment);
                    report.skipped_runs.extend(skipped);
                }
                ExperimentOutcome::Failed { experiment, reason } => {
                    report.failed.push((experiment, reason));
                }
            }
        }
        report
    }

    /// True when every experiment produced an aggregate and no run was skipped.
    pub fn is_clean(&self) -> bool {
        self.empty.is_empty() && self.failed.is_empty() && self.skipped_runs.is_empty()
    }
}
