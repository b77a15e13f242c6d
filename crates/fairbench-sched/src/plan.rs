use std::env;
use std::path::{Path, PathBuf};

use fairbench_core::errors::{BenchError, ErrorInfo};
use fairbench_core::serde::{read_yaml_file, stable_hash_string, to_yaml_string};
use fairbench_core::{ParameterGrid, ResultLayout, SeedPolicy};
use serde::{Deserialize, Serialize};

use crate::simulator::SimulatorSpec;

/// Scenarios of the TCP fairness study: homogeneous and mixed congestion
/// control pairings over the dumbbell topology.
pub const DEFAULT_SCENARIOS: [&str; 8] = [
    "AllNewReno",
    "AllCubic",
    "AllBbr",
    "AllDctcp",
    "RenoVsCubic",
    "RenoVsBbr",
    "BbrVsCubic",
    "AllMixed",
];

/// Worker pool settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerSpec {
    /// Concurrent simulator processes; defaults to 75% of the hardware threads.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub concurrency: Option<usize>,
    /// Launches per job before it is recorded as failed.
    #[serde(default = "SchedulerSpec::default_max_attempts")]
    pub max_attempts: u32,
    /// Per-launch timeout in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
    /// Keep existing well-formed run tables instead of re-running them.
    #[serde(default)]
    pub resume: bool,
}

impl SchedulerSpec {
    const fn default_max_attempts() -> u32 {
        1
    }
}

impl Default for SchedulerSpec {
    fn default() -> Self {
        Self {
            concurrency: None,
            max_attempts: Self::default_max_attempts(),
            timeout_secs: None,
            resume: false,
        }
    }
}

/// Experiment plan: what to run, how often, and with which simulator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    /// Directory receiving one sub-directory per experiment.
    pub results_root: PathBuf,
    /// Repetitions of every grid cell.
    pub repetitions: u32,
    /// Parameter grid.
    pub grid: ParameterGrid,
    /// Simulator invocation.
    pub simulator: SimulatorSpec,
    /// Worker pool settings.
    #[serde(default)]
    pub scheduler: SchedulerSpec,
    /// Seed policy for simulator runs.
    #[serde(default)]
    pub seeds: SeedPolicy,
    /// Directory containing the plan on disk (ignored when serializing).
    #[serde(skip)]
    pub base_dir: PathBuf,
}

impl Plan {
    /// Plan covering [`DEFAULT_SCENARIOS`] with both RTT modes.
    pub fn with_defaults(simulator: SimulatorSpec, repetitions: u32) -> Self {
        Self {
            results_root: PathBuf::from("all_results_csv"),
            repetitions,
            grid: ParameterGrid::new(DEFAULT_SCENARIOS),
            simulator,
            scheduler: SchedulerSpec::default(),
            seeds: SeedPolicy::default(),
            base_dir: PathBuf::new(),
        }
    }

    /// Returns the deterministic hash associated with the plan contents.
    pub fn plan_hash(&self) -> Result<String, BenchError> {
        stable_hash_string(self)
    }

    /// Produces a YAML representation of the plan.
    pub fn to_yaml_string(&self) -> Result<String, BenchError> {
        to_yaml_string(self)
    }

    /// Checks every invariant that must hold before jobs are dispatched.
    pub fn validate(&self) -> Result<(), BenchError> {
        if self.repetitions == 0 {
            return Err(config_error("repetitions", "at least one repetition is required"));
        }
        if self.grid.scenarios.is_empty() || self.grid.rtt_modes.is_empty() {
            return Err(config_error("grid", "grid needs a scenario and an RTT mode"));
        }
        if let Some(dim) = self.grid.dimensions.iter().find(|dim| dim.values.is_empty()) {
            return Err(config_error(
                "grid",
                format!("dimension `{}` has no values", dim.name),
            ));
        }
        if self.scheduler.max_attempts == 0 {
            return Err(config_error("scheduler.max_attempts", "must be at least 1"));
        }
        if self.scheduler.concurrency == Some(0) {
            return Err(config_error("scheduler.concurrency", "must be at least 1"));
        }
        if self.scheduler.timeout_secs == Some(0) {
            return Err(config_error("scheduler.timeout_secs", "must be positive"));
        }
        self.grid.experiments()?;
        Ok(())
    }

    /// Results layout with the root resolved against the plan directory.
    pub fn layout(&self) -> Result<ResultLayout, BenchError> {
        Ok(ResultLayout::new(absolute(
            &self.base_dir.join(&self.results_root),
        )?))
    }

    /// Simulator invocation with relative paths resolved against the plan directory.
    pub fn resolved_simulator(&self) -> Result<SimulatorSpec, BenchError> {
        let mut spec = self.simulator.clone();
        if let Some(dir) = &spec.working_dir {
            spec.working_dir = Some(absolute(&self.base_dir.join(dir))?);
        } else if !self.base_dir.as_os_str().is_empty() {
            spec.working_dir = Some(absolute(&self.base_dir)?);
        }
        Ok(spec)
    }
}

/// Loads and validates a plan from disk.
pub fn load_plan<P: AsRef<Path>>(path: P) -> Result<Plan, BenchError> {
    let plan_path = path.as_ref();
    let mut plan: Plan = read_yaml_file(plan_path, "plan_read")?;
    plan.base_dir = plan_path
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .to_path_buf();
    plan.validate()?;
    Ok(plan)
}

/// Default worker count: 75% of the available hardware threads, at least one.
pub fn default_concurrency() -> usize {
    let threads = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    (threads * 3 / 4).max(1)
}

fn absolute(path: &Path) -> Result<PathBuf, BenchError> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    let cwd = env::current_dir().map_err(|err| BenchError::io("current_dir", path, err))?;
    Ok(cwd.join(path))
}

fn config_error(field: &str, message: impl Into<String>) -> BenchError {
    BenchError::Config(ErrorInfo::new("invalid_plan", message).with_context("field", field))
}
