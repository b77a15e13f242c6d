use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use chrono::Utc;
use fairbench_core::errors::BenchError;
use fairbench_core::serde::{read_json_file, to_canonical_json_bytes};
use serde::{Deserialize, Serialize};

use crate::job::JobDescriptor;

/// File name of the persisted run summary inside the results root.
pub const SUMMARY_FILE: &str = "run_summary.json";

/// Terminal state of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum JobState {
    /// The simulator exited with status 0 and wrote its table.
    Succeeded,
    /// Every attempt exited non-zero, failed to spawn, or wrote nothing.
    Failed,
    /// The last attempt exceeded the per-job timeout and was killed.
    TimedOut,
    /// The pass was cancelled before or while the job ran.
    Cancelled,
    /// An existing well-formed table was kept (resume mode).
    Reused,
}

impl JobState {
    /// States counted as successes in the summary.
    pub fn is_success(self) -> bool {
        matches!(self, JobState::Succeeded | JobState::Reused)
    }
}

/// Outcome of a single job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobStatus {
    /// Terminal state.
    pub state: JobState,
    /// Number of simulator launches.
    pub attempts: u32,
    /// Exit code of the last launch, absent when killed or never launched.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    /// Diagnostic for unsuccessful jobs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl JobStatus {
    /// Successful completion after `attempts` launches.
    pub fn success(attempts: u32) -> Self {
        Self {
            state: JobState::Succeeded,
            attempts,
            exit_code: Some(0),
            error: None,
        }
    }

    /// Unsuccessful completion in `state`.
    pub fn unsuccessful(
        state: JobState,
        attempts: u32,
        exit_code: Option<i32>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            state,
            attempts,
            exit_code,
            error: Some(error.into()),
        }
    }

    /// Existing output kept without launching the simulator.
    pub fn reused() -> Self {
        Self {
            state: JobState::Reused,
            attempts: 0,
            exit_code: None,
            error: None,
        }
    }
}

/// Report entry for a single job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobResult {
    /// Job that was executed.
    pub job: JobDescriptor,
    /// Seed of the last launch.
    pub seed: u64,
    /// Execution outcome.
    pub status: JobStatus,
    /// Wall clock time spent on the job in milliseconds.
    pub elapsed_ms: u64,
}

impl JobResult {
    /// True for succeeded and reused jobs.
    pub fn success(&self) -> bool {
        self.status.state.is_success()
    }
}

/// Provenance recorded alongside a run summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunProvenance {
    /// Hash of the plan driving the pass, empty for ad-hoc schedules.
    pub plan_hash: String,
    /// RFC 3339 creation timestamp.
    pub created_at: String,
    /// Crate versions involved in the pass.
    pub tool_versions: BTreeMap<String, String>,
    /// Whether job seeds can be re-derived from the plan.
    pub reproducible_seeds: bool,
}

impl RunProvenance {
    /// Provenance stamped with the current time.
    pub fn now(plan_hash: impl Into<String>, reproducible_seeds: bool) -> Self {
        let mut tool_versions = BTreeMap::new();
        tool_versions.insert(
            "fairbench-sched".to_string(),
            env!("CARGO_PKG_VERSION").to_string(),
        );
        Self {
            plan_hash: plan_hash.into(),
            created_at: Utc::now().to_rfc3339(),
            tool_versions,
            reproducible_seeds,
        }
    }
}

/// Counts and per-job results of one scheduling pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Jobs whose simulator exited cleanly, including reused outputs.
    pub succeeded: usize,
    /// Jobs that exited non-zero, failed to launch or timed out.
    pub failed: usize,
    /// Jobs stopped by cancellation.
    pub cancelled: usize,
    /// Jobs satisfied by an existing output (subset of `succeeded`).
    pub reused: usize,
    /// Concurrency bound the pass ran with.
    pub concurrency: usize,
    /// Per-job results in enumeration order.
    pub jobs: Vec<JobResult>,
    /// Provenance of the pass.
    pub provenance: RunProvenance,
}

impl RunSummary {
    /// Folds per-job results into counts.
    pub fn from_results(
        jobs: Vec<JobResult>,
        concurrency: usize,
        provenance: RunProvenance,
    ) -> Self {
        let mut summary = Self {
            succeeded: 0,
            failed: 0,
            cancelled: 0,
            reused: 0,
            concurrency,
            jobs: Vec::new(),
            provenance,
        };
        for job in &jobs {
            match job.status.state {
                JobState::Succeeded => summary.succeeded += 1,
                JobState::Reused => {
                    summary.succeeded += 1;
                    summary.reused += 1;
                }
                JobState::Failed | JobState::TimedOut => summary.failed += 1,
                JobState::Cancelled => summary.cancelled += 1,
            }
        }
        summary.jobs = jobs;
        summary
    }

    /// Total number of scheduled jobs.
    pub fn total(&self) -> usize {
        self.jobs.len()
    }

    /// True when every job succeeded.
    pub fn all_succeeded(&self) -> bool {
        self.succeeded == self.total()
    }

    /// Failed, timed out and cancelled jobs.
    pub fn unsuccessful(&self) -> impl Iterator<Item = &JobResult> {
        self.jobs.iter().filter(|job| !job.success())
    }

    /// Writes the summary as canonical JSON to `path`.
    pub fn persist(&self, path: &Path) -> Result<(), BenchError> {
        let bytes = to_canonical_json_bytes(self)?;
        fs::write(path, bytes).map_err(|err| BenchError::io("summary_write", path, err))
    }

    /// Loads a summary written by [`RunSummary::persist`].
    pub fn load(path: &Path) -> Result<Self, BenchError> {
        read_json_file(path, "summary_read")
    }
}
