#![doc = "Averaging of repeated simulator runs on a shared time axis and grouping of the averaged metrics."]

pub mod aggregate;
pub mod group;
pub mod report;
mod sum;
pub mod table;

pub use aggregate::{
    format_value, Aggregate, AggregatedRow, AggregatedTable, ExperimentAggregate, SeriesAggregator,
};
pub use group::{MetricGroup, MetricGrouper, MetricGroups, DEFAULT_SUFFIXES};
pub use report::{AggregationReport, ExperimentOutcome, SkippedRun, WrittenAggregate};
pub use table::{RunRow, RunTable, DEFAULT_TIME_COLUMN};
