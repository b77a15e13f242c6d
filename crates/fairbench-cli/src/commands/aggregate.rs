use std::error::Error;
use std::path::PathBuf;

use clap::Args as ClapArgs;
use fairbench_agg::{AggregationReport, SeriesAggregator, DEFAULT_TIME_COLUMN};

use super::print_aggregation;

#[derive(ClapArgs, Debug)]
pub struct AggregateArgs {
    /// Results root holding one directory per experiment.
    #[arg(long)]
    pub root: PathBuf,
    /// Name of the time key column.
    #[arg(long, default_value = DEFAULT_TIME_COLUMN)]
    pub time_column: String,
    /// Only average runs numbered up to this repetition count.
    #[arg(long)]
    pub repetitions: Option<u32>,
}

pub fn run(args: &AggregateArgs, json: bool) -> Result<bool, Box<dyn Error>> {
    let report = aggregate_root(&args.root, &args.time_column, args.repetitions)?;
    print_aggregation(&report, json)?;
    Ok(report.failed.is_empty())
}

pub(crate) fn aggregate_root(
    root: &std::path::Path,
    time_column: &str,
    repetitions: Option<u32>,
) -> Result<AggregationReport, Box<dyn Error>> {
    let mut aggregator = SeriesAggregator::new(time_column);
    if let Some(repetitions) = repetitions {
        aggregator = aggregator.with_max_runs(repetitions);
    }
    Ok(aggregator.aggregate_all(root)?)
}
