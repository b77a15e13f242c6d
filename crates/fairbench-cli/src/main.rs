use std::error::Error;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use commands::{
    aggregate::{self, AggregateArgs},
    plan::{self, PlanArgs},
    plot::{self, PlotArgs},
    run::{self, PipelineArgs, RunArgs},
};
use tracing_subscriber::{fmt, EnvFilter};

mod commands;

#[derive(Parser, Debug)]
#[command(name = "fairbench", about = "Batch runner for TCP fairness simulations")]
struct Cli {
    /// Log debug events (overridden by `RUST_LOG`).
    #[arg(short, long, global = true)]
    verbose: bool,
    /// Print pass reports as JSON on stdout.
    #[arg(long, global = true)]
    json: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run every grid cell of a plan through the simulator.
    Run(RunArgs),
    /// Average the run tables of every experiment under a results root.
    Aggregate(AggregateArgs),
    /// Draw SVG charts for every aggregate in a workspace.
    Plot(PlotArgs),
    /// Run, aggregate and plot in one go.
    Pipeline(PipelineArgs),
    /// Write a plan covering the default scenario set.
    Plan(PlanArgs),
}

fn main() -> Result<ExitCode, Box<dyn Error>> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let ok = match cli.command {
        Command::Run(args) => run::run(&args, cli.json)?,
        Command::Aggregate(args) => aggregate::run(&args, cli.json)?,
        Command::Plot(args) => plot::run(&args, cli.json)?,
        Command::Pipeline(args) => run::pipeline(&args, cli.json)?,
        Command::Plan(args) => plan::run(&args)?,
    };
    Ok(if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
