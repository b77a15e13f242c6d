use std::error::Error;
use std::path::{Path, PathBuf};

use clap::Args as ClapArgs;
use fairbench_agg::{AggregationReport, DEFAULT_TIME_COLUMN};
use fairbench_core::SeedPolicy;
use fairbench_plot::RenderReport;
use fairbench_sched::{load_plan, run_plan, Plan, RunOpts, RunSummary, SUMMARY_FILE};
use serde::Serialize;
use tracing::warn;

use super::{aggregate, plot, print_aggregation, print_json, print_render};

/// Command line overrides of the plan's scheduler section.
#[derive(ClapArgs, Debug, Default)]
pub struct RunOverrides {
    /// Concurrent simulator processes.
    #[arg(long)]
    pub concurrency: Option<usize>,
    /// Keep existing well-formed run tables.
    #[arg(long)]
    pub resume: bool,
    /// Kill a simulator after this many seconds.
    #[arg(long)]
    pub timeout_secs: Option<u64>,
    /// Launches per job before it is recorded as failed.
    #[arg(long)]
    pub max_attempts: Option<u32>,
    /// Derive every job seed from this master seed.
    #[arg(long)]
    pub master_seed: Option<u64>,
}

impl RunOverrides {
    fn apply(&self, plan: &mut Plan) {
        if let Some(concurrency) = self.concurrency {
            plan.scheduler.concurrency = Some(concurrency);
        }
        if self.resume {
            plan.scheduler.resume = true;
        }
        if let Some(timeout) = self.timeout_secs {
            plan.scheduler.timeout_secs = Some(timeout);
        }
        if let Some(attempts) = self.max_attempts {
            plan.scheduler.max_attempts = attempts;
        }
        if let Some(master) = self.master_seed {
            plan.seeds = SeedPolicy::Derived { master };
        }
    }
}

#[derive(ClapArgs, Debug)]
pub struct RunArgs {
    /// YAML plan describing the grid and the simulator.
    #[arg(long)]
    pub plan: PathBuf,
    #[command(flatten)]
    pub overrides: RunOverrides,
}

#[derive(ClapArgs, Debug)]
pub struct PipelineArgs {
    /// YAML plan describing the grid and the simulator.
    #[arg(long)]
    pub plan: PathBuf,
    #[command(flatten)]
    pub overrides: RunOverrides,
    /// Name of the time key column.
    #[arg(long, default_value = DEFAULT_TIME_COLUMN)]
    pub time_column: String,
    /// Chart output directory; defaults to `plots` next to the results root.
    #[arg(long)]
    pub out: Option<PathBuf>,
}

/// Everything one `--json pipeline` invocation reports, as a single document.
#[derive(Serialize)]
struct PipelineReport<'a> {
    run: &'a RunSummary,
    aggregation: Option<&'a AggregationReport>,
    render: Option<&'a RenderReport>,
}

pub fn run(args: &RunArgs, json: bool) -> Result<bool, Box<dyn Error>> {
    let (plan, summary) = execute(&args.plan, &args.overrides)?;
    if json {
        print_json(&summary)?;
    } else {
        print_summary(&plan, &summary)?;
    }
    Ok(summary.all_succeeded())
}

pub fn pipeline(args: &PipelineArgs, json: bool) -> Result<bool, Box<dyn Error>> {
    let (plan, summary) = execute(&args.plan, &args.overrides)?;
    if !json {
        print_summary(&plan, &summary)?;
    }
    if summary.cancelled > 0 {
        warn!("pass cancelled; skipping aggregation and plotting");
        if json {
            print_json(&PipelineReport {
                run: &summary,
                aggregation: None,
                render: None,
            })?;
        }
        return Ok(false);
    }
    let layout = plan.layout()?;
    let aggregation =
        aggregate::aggregate_root(layout.root(), &args.time_column, Some(plan.repetitions))?;
    let workspace = layout.aggregate_dir();
    if !json {
        print_aggregation(&aggregation, false)?;
    }
    let rendering = plot::render(&workspace, args.out.as_deref(), &args.time_column)?;
    if json {
        print_json(&PipelineReport {
            run: &summary,
            aggregation: Some(&aggregation),
            render: Some(&rendering),
        })?;
    } else {
        print_render(&rendering, false)?;
    }
    Ok(summary.all_succeeded() && aggregation.failed.is_empty() && rendering.failed.is_empty())
}

fn execute(plan_path: &Path, overrides: &RunOverrides) -> Result<(Plan, RunSummary), Box<dyn Error>> {
    let mut plan = load_plan(plan_path)?;
    overrides.apply(&mut plan);
    let opts = RunOpts::from_plan(&plan);
    let cancel = opts.cancel.clone();
    ctrlc::set_handler(move || cancel.cancel())?;

    let summary = run_plan(&plan, &opts)?;
    Ok((plan, summary))
}

fn print_summary(plan: &Plan, summary: &RunSummary) -> Result<(), Box<dyn Error>> {
    println!(
        "{} jobs: {} succeeded ({} reused), {} failed, {} cancelled",
        summary.total(),
        summary.succeeded,
        summary.reused,
        summary.failed,
        summary.cancelled
    );
    for result in summary.unsuccessful() {
        println!(
            "{:?} {} run {}: {} (log: {})",
            result.status.state,
            result.job.key,
            result.job.run,
            result.status.error.as_deref().unwrap_or("unknown error"),
            result.job.log.display()
        );
    }
    println!(
        "summary written to {}",
        plan.layout()?.root().join(SUMMARY_FILE).display()
    );
    Ok(())
}
