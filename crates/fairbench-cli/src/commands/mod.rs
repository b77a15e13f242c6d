pub mod aggregate;
pub mod plan;
pub mod plot;
pub mod run;

use std::error::Error;

use fairbench_agg::AggregationReport;
use fairbench_plot::RenderReport;
use serde::Serialize;

fn print_json<T: Serialize>(value: &T) -> Result<(), Box<dyn Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub(crate) fn print_aggregation(report: &AggregationReport, json: bool) -> Result<(), Box<dyn Error>> {
    if json {
        return print_json(report);
    }
    for written in &report.written {
        println!(
            "averaged {} runs of {} into {}",
            written.runs_used,
            written.experiment,
            written.path.display()
        );
    }
    for experiment in &report.empty {
        println!("no usable runs for {experiment}");
    }
    for skipped in &report.skipped_runs {
        println!("skipped {}: {}", skipped.path.display(), skipped.reason);
    }
    for (experiment, reason) in &report.failed {
        println!("FAILED {experiment}: {reason}");
    }
    Ok(())
}

pub(crate) fn print_render(report: &RenderReport, json: bool) -> Result<(), Box<dyn Error>> {
    if json {
        return print_json(report);
    }
    println!("wrote {} charts", report.charts.len());
    for (experiment, reason) in &report.skipped {
        println!("skipped {experiment}: {reason}");
    }
    for (chart, reason) in &report.failed {
        println!("FAILED {chart}: {reason}");
    }
    Ok(())
}
