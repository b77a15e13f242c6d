use std::error::Error;
use std::fs;
use std::path::PathBuf;

use clap::Args as ClapArgs;
use fairbench_sched::{Plan, SimulatorSpec};
use tracing::info;

#[derive(ClapArgs, Debug)]
pub struct PlanArgs {
    /// Destination YAML file.
    #[arg(long)]
    pub out: PathBuf,
    /// Simulator program.
    #[arg(long, default_value = "./ns3")]
    pub program: PathBuf,
    /// Argument placed before the per-job flags; repeatable.
    /// Defaults to `run scratch/script.cc --`.
    #[arg(long = "prefix-arg", allow_hyphen_values = true)]
    pub prefix_args: Vec<String>,
    /// Repetitions of every grid cell.
    #[arg(long, default_value_t = 10)]
    pub repetitions: u32,
    /// Overwrite an existing file.
    #[arg(long)]
    pub force: bool,
}

pub fn run(args: &PlanArgs) -> Result<bool, Box<dyn Error>> {
    if args.out.exists() && !args.force {
        return Err(format!("{} exists; pass --force to overwrite", args.out.display()).into());
    }
    let mut simulator = SimulatorSpec::new(&args.program);
    simulator.args = if args.prefix_args.is_empty() {
        ["run", "scratch/script.cc", "--"].map(String::from).to_vec()
    } else {
        args.prefix_args.clone()
    };
    let plan = Plan::with_defaults(simulator, args.repetitions);
    plan.validate()?;
    fs::write(&args.out, plan.to_yaml_string()?)?;
    info!(path = %args.out.display(), cells = plan.grid.len(), "plan written");
    Ok(true)
}
