use std::fs::{self, File};
use std::path::Path;
use std::process::{Child, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use csv::{ReaderBuilder, Trim};
use fairbench_core::errors::{BenchError, ErrorInfo};
use fairbench_core::{ensure_dir, ParameterGrid, ResultLayout, SeedPolicy};
use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::cancel::CancelToken;
use crate::job::{enumerate_jobs, JobDescriptor};
use crate::plan::{default_concurrency, Plan};
use crate::report::{JobResult, JobState, JobStatus, RunProvenance, RunSummary, SUMMARY_FILE};
use crate::simulator::SimulatorSpec;

const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Options governing a scheduling pass.
#[derive(Debug, Clone)]
pub struct RunOpts {
    /// Upper bound on concurrently running simulator processes.
    pub concurrency: usize,
    /// Launches per job before it is recorded as failed.
    pub max_attempts: u32,
    /// Per-launch timeout; the child is killed once it elapses.
    pub timeout: Option<Duration>,
    /// Keep existing well-formed run tables.
    pub resume: bool,
    /// Seed policy for job seeds and retries.
    pub seeds: SeedPolicy,
    /// Stop flag shared with the caller.
    pub cancel: CancelToken,
}

impl Default for RunOpts {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            max_attempts: 1,
            timeout: None,
            resume: false,
            seeds: SeedPolicy::default(),
            cancel: CancelToken::new(),
        }
    }
}

impl RunOpts {
    /// Options taken from the plan's scheduler section.
    pub fn from_plan(plan: &Plan) -> Self {
        Self {
            concurrency: plan
                .scheduler
                .concurrency
                .unwrap_or_else(default_concurrency),
            max_attempts: plan.scheduler.max_attempts,
            timeout: plan.scheduler.timeout_secs.map(Duration::from_secs),
            resume: plan.scheduler.resume,
            seeds: plan.seeds,
            cancel: CancelToken::new(),
        }
    }
}

/// Dispatches simulator jobs over a bounded worker pool.
#[derive(Debug, Clone)]
pub struct Scheduler {
    simulator: SimulatorSpec,
    layout: ResultLayout,
    opts: RunOpts,
}

impl Scheduler {
    /// Scheduler writing under `layout` with default options.
    pub fn new(simulator: SimulatorSpec, layout: ResultLayout) -> Self {
        Self {
            simulator,
            layout,
            opts: RunOpts::default(),
        }
    }

    /// Replaces the pass options.
    pub fn with_opts(mut self, opts: RunOpts) -> Self {
        self.opts = opts;
        self
    }

    /// Options of the pass.
    pub fn opts(&self) -> &RunOpts {
        &self.opts
    }

    /// Runs every cell of `grid` `repetitions` times with at most
    /// `max_concurrency` simulators alive at once.
    ///
    /// Fails only on configuration errors, before any job is dispatched.
    /// Per-job failures are recorded in the returned summary.
    pub fn schedule(
        &self,
        grid: &ParameterGrid,
        repetitions: u32,
        max_concurrency: usize,
    ) -> Result<RunSummary, BenchError> {
        self.schedule_with_hash(grid, repetitions, max_concurrency, String::new())
    }

    fn schedule_with_hash(
        &self,
        grid: &ParameterGrid,
        repetitions: u32,
        max_concurrency: usize,
        plan_hash: String,
    ) -> Result<RunSummary, BenchError> {
        let program = self.simulator.locate()?;
        let jobs = enumerate_jobs(grid, repetitions, &self.layout, self.opts.seeds)?;
        ensure_dir(self.layout.root())?;
        let concurrency = max_concurrency.max(1);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(concurrency)
            .thread_name(|idx| format!("fairbench-worker-{idx}"))
            .build()
            .map_err(|err| BenchError::Config(ErrorInfo::new("thread_pool", err.to_string())))?;

        info!(
            jobs = jobs.len(),
            concurrency,
            program = %program.display(),
            "dispatching simulator runs"
        );
        let results: Vec<JobResult> = pool.install(|| {
            jobs.into_par_iter()
                .map(|job| self.process_job(&program, job))
                .collect()
        });

        let provenance = RunProvenance::now(plan_hash, self.opts.seeds.is_reproducible());
        let summary = RunSummary::from_results(results, concurrency, provenance);
        info!(
            succeeded = summary.succeeded,
            failed = summary.failed,
            cancelled = summary.cancelled,
            reused = summary.reused,
            "scheduling pass finished"
        );
        Ok(summary)
    }

    fn process_job(&self, program: &Path, job: JobDescriptor) -> JobResult {
        let started = Instant::now();
        let experiment = job.key.name();
        let first_seed = job.seed;
        if self.opts.cancel.is_cancelled() {
            let status =
                JobStatus::unsuccessful(JobState::Cancelled, 0, None, "cancelled before launch");
            return finish(job, first_seed, status, started);
        }
        if self.opts.resume && table_is_complete(&job.output) {
            info!(experiment = %experiment, run = job.run, "reusing existing run table");
            return finish(job, first_seed, JobStatus::reused(), started);
        }
        if let Err(err) = self.layout.prepare_run_path(&job.key, job.run) {
            warn!(experiment = %experiment, run = job.run, error = %err, "cannot prepare output");
            let status = JobStatus::unsuccessful(JobState::Failed, 0, None, err.to_string());
            return finish(job, first_seed, status, started);
        }

        let mut attempt = 0u32;
        let mut seed = first_seed;
        loop {
            attempt += 1;
            if attempt > 1 {
                seed = self.opts.seeds.seed_for(&experiment, job.run, attempt);
            }
            remove_partial(&job.output);
            let outcome = launch(
                &self.simulator,
                program,
                &job,
                seed,
                self.opts.timeout,
                &self.opts.cancel,
            );
            let (state, exit_code, error) = match outcome {
                Ok(Launch::Exited(Some(0))) if job.output.is_file() => {
                    info!(experiment = %experiment, run = job.run, seed, attempt, "simulator run succeeded");
                    return finish(job, seed, JobStatus::success(attempt), started);
                }
                Ok(Launch::Exited(Some(0))) => (
                    JobState::Failed,
                    Some(0),
                    "simulator exited cleanly without writing its output".to_string(),
                ),
                Ok(Launch::Exited(Some(code))) => (
                    JobState::Failed,
                    Some(code),
                    format!("simulator exited with status {code}"),
                ),
                Ok(Launch::Exited(None)) => (
                    JobState::Failed,
                    None,
                    "simulator terminated by a signal".to_string(),
                ),
                Ok(Launch::TimedOut) => (
                    JobState::TimedOut,
                    None,
                    format!(
                        "simulator killed after {}s",
                        self.opts.timeout.unwrap_or_default().as_secs()
                    ),
                ),
                Ok(Launch::Cancelled) => {
                    (JobState::Cancelled, None, "simulator killed on cancellation".to_string())
                }
                Err(err) => (JobState::Failed, None, err.to_string()),
            };
            remove_partial(&job.output);
            let exhausted = attempt >= self.opts.max_attempts.max(1);
            if state == JobState::Cancelled || exhausted || self.opts.cancel.is_cancelled() {
                warn!(
                    experiment = %experiment,
                    run = job.run,
                    seed,
                    attempt,
                    log = %job.log.display(),
                    "{error}"
                );
                let status = JobStatus::unsuccessful(state, attempt, exit_code, error);
                return finish(job, seed, status, started);
            }
            debug!(experiment = %experiment, run = job.run, attempt, "{error}; retrying");
        }
    }
}

/// Executes a plan and persists `run_summary.json` under its results root.
pub fn run_plan(plan: &Plan, opts: &RunOpts) -> Result<RunSummary, BenchError> {
    plan.validate()?;
    let layout = plan.layout()?;
    let scheduler =
        Scheduler::new(plan.resolved_simulator()?, layout.clone()).with_opts(opts.clone());
    let summary = scheduler.schedule_with_hash(
        &plan.grid,
        plan.repetitions,
        opts.concurrency,
        plan.plan_hash()?,
    )?;
    summary.persist(&layout.root().join(SUMMARY_FILE))?;
    Ok(summary)
}

enum Launch {
    Exited(Option<i32>),
    TimedOut,
    Cancelled,
}

fn launch(
    spec: &SimulatorSpec,
    program: &Path,
    job: &JobDescriptor,
    seed: u64,
    timeout: Option<Duration>,
    cancel: &CancelToken,
) -> Result<Launch, BenchError> {
    let log = File::create(&job.log).map_err(|err| BenchError::io("log_create", &job.log, err))?;
    let log_err = log
        .try_clone()
        .map_err(|err| BenchError::io("log_clone", &job.log, err))?;
    let mut command = spec.command(program, job, seed);
    command
        .stdin(Stdio::null())
        .stdout(Stdio::from(log))
        .stderr(Stdio::from(log_err));
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        // Wrappers such as `./ns3 run` leave the simulator as a grandchild;
        // a fresh process group lets `terminate` reach all of them.
        command.process_group(0);
    }
    debug!(?command, "launching simulator");
    let mut child = command.spawn().map_err(|err| {
        BenchError::Job(
            ErrorInfo::new("spawn", err.to_string())
                .with_context("program", program.display().to_string())
                .with_context("experiment", job.key.name()),
        )
    })?;

    let deadline = timeout.map(|limit| Instant::now() + limit);
    loop {
        match child.try_wait() {
            Ok(Some(status)) => {
                kill_group(&child);
                return Ok(Launch::Exited(status.code()));
            }
            Ok(None) => {}
            Err(err) => {
                terminate(&mut child);
                return Err(BenchError::Job(
                    ErrorInfo::new("wait", err.to_string())
                        .with_context("experiment", job.key.name()),
                ));
            }
        }
        if cancel.is_cancelled() {
            terminate(&mut child);
            return Ok(Launch::Cancelled);
        }
        if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            terminate(&mut child);
            return Ok(Launch::TimedOut);
        }
        thread::sleep(POLL_INTERVAL);
    }
}

fn terminate(child: &mut Child) {
    kill_group(child);
    let _ = child.kill();
    let _ = child.wait();
}

/// Kills every process left in the child's group, including background
/// processes that outlived the group leader.
#[cfg(unix)]
fn kill_group(child: &Child) {
    let Ok(pgid) = libc::pid_t::try_from(child.id()) else {
        return;
    };
    // SAFETY: killpg only sends a signal; the group was created for this child.
    let rc = unsafe { libc::killpg(pgid, libc::SIGKILL) };
    if rc == 0 {
        debug!(pgid, "killed simulator process group");
    }
}

#[cfg(not(unix))]
fn kill_group(_child: &Child) {}

fn finish(job: JobDescriptor, seed: u64, status: JobStatus, started: Instant) -> JobResult {
    JobResult {
        job,
        seed,
        status,
        elapsed_ms: started.elapsed().as_millis() as u64,
    }
}

fn remove_partial(path: &Path) {
    let _ = fs::remove_file(path);
}

/// True when `path` holds a header and at least one row of equal width.
pub fn table_is_complete(path: &Path) -> bool {
    let Ok(mut reader) = ReaderBuilder::new()
        .comment(Some(b'#'))
        .trim(Trim::All)
        .from_path(path)
    else {
        return false;
    };
    match reader.headers() {
        Ok(headers) if !headers.is_empty() => {}
        _ => return false,
    }
    let mut rows = 0usize;
    for record in reader.records() {
        if record.is_err() {
            return false;
        }
        rows += 1;
    }
    rows > 0
}
