#![doc = "SVG charts of aggregated fairbench series: one per metric group, one per single metric and a stacked overview per experiment."]

pub mod render;
mod units;

pub use render::{aggregate_experiment, ChartSpec, RenderReport, ReportRenderer, SeriesData};
pub use units::UnitLabels;
