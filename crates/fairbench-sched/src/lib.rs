#![deny(missing_docs)]
#![doc = "Grid enumeration and bounded parallel dispatch of external simulator runs."]

/// Cooperative cancellation shared with workers.
pub mod cancel;
/// Worker pool, child process supervision and retries.
pub mod dispatch;
/// Job descriptors and grid enumeration.
pub mod job;
/// Plan loading and validation.
pub mod plan;
/// Per-job outcomes and run summaries.
pub mod report;
/// Simulator lookup and command construction.
pub mod simulator;

pub use cancel::CancelToken;
pub use dispatch::{run_plan, table_is_complete, RunOpts, Scheduler};
pub use job::{enumerate_jobs, JobDescriptor};
pub use plan::{default_concurrency, load_plan, Plan, SchedulerSpec, DEFAULT_SCENARIOS};
pub use report::{JobResult, JobState, JobStatus, RunProvenance, RunSummary, SUMMARY_FILE};
pub use simulator::{SimulatorFlags, SimulatorSpec};
