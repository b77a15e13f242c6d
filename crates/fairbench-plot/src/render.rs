//! Per-metric and stacked overview charts of aggregated series.

use std::error::Error;
use std::fs;
use std::ops::Range;
use std::path::{Path, PathBuf};

use fairbench_agg::{MetricGrouper, RunTable, DEFAULT_TIME_COLUMN};
use fairbench_core::errors::{BenchError, ErrorInfo};
use fairbench_core::{ensure_dir, AGGREGATE_FILE_PREFIX, TABLE_EXTENSION};
use plotters::coord::Shift;
use plotters::prelude::*;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::units::UnitLabels;

const CHART_EXTENSION: &str = "svg";
const PANEL_HEIGHT: u32 = 320;

/// One line of a chart.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesData {
    /// Legend label.
    pub label: String,
    /// `(time, value)` points with missing cells left out.
    pub points: Vec<(f64, f64)>,
}

/// A chart to draw: one panel of one or more lines.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartSpec {
    /// File name without extension, also used as panel key.
    pub file_stem: String,
    /// Caption.
    pub title: String,
    /// Y axis description.
    pub y_label: String,
    /// Lines of the panel.
    pub series: Vec<SeriesData>,
}

/// Files written and charts skipped during a rendering pass.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RenderReport {
    /// Charts written.
    pub charts: Vec<PathBuf>,
    /// Aggregates with nothing to draw, with the reason.
    pub skipped: Vec<(String, String)>,
    /// Charts or aggregates that failed, with the reason.
    pub failed: Vec<(String, String)>,
}

impl RenderReport {
    fn merge(&mut self, other: RenderReport) {
        self.charts.extend(other.charts);
        self.skipped.extend(other.skipped);
        self.failed.extend(other.failed);
    }
}

/// Draws grouped metric charts for aggregated tables.
#[derive(Debug, Clone)]
pub struct ReportRenderer {
    grouper: MetricGrouper,
    units: UnitLabels,
    time_column: String,
    width: u32,
    height: u32,
}

impl Default for ReportRenderer {
    fn default() -> Self {
        Self::new(MetricGrouper::default(), UnitLabels::default())
    }
}

impl ReportRenderer {
    /// Renderer using `grouper` for column partitioning and `units` for axis labels.
    pub fn new(grouper: MetricGrouper, units: UnitLabels) -> Self {
        Self {
            grouper,
            units,
            time_column: DEFAULT_TIME_COLUMN.to_string(),
            width: 1200,
            height: 600,
        }
    }

    /// Reads aggregates keyed on `time_column` instead of `Time`.
    pub fn with_time_column(mut self, time_column: impl Into<String>) -> Self {
        self.time_column = time_column.into();
        self.grouper = self.grouper.with_time_column(self.time_column.clone());
        self
    }

    /// Plans the charts of one experiment: one per metric group, then one per
    /// single metric. Columns without any value are left out.
    pub fn charts(&self, experiment: &str, table: &RunTable) -> Vec<ChartSpec> {
        let numeric: Vec<&String> = table
            .columns()
            .iter()
            .enumerate()
            .filter(|(idx, _)| table.is_numeric(*idx))
            .map(|(_, name)| name)
            .collect();
        let groups = self.grouper.group(&numeric);
        let mut charts = Vec::new();
        for group in &groups.groups {
            let series: Vec<SeriesData> = group
                .columns
                .iter()
                .filter_map(|column| {
                    self.series(table, column, self.grouper.entity_label(column))
                })
                .collect();
            if series.is_empty() {
                continue;
            }
            charts.push(ChartSpec {
                file_stem: format!("{experiment}_{}", sanitize(&group.suffix)),
                title: format!("{experiment}: {}", self.units.label(&group.suffix)),
                y_label: self.units.label(&group.suffix).to_string(),
                series,
            });
        }
        for single in &groups.singles {
            if let Some(series) = self.series(table, single, single) {
                charts.push(ChartSpec {
                    file_stem: format!("{experiment}_{}", sanitize(single)),
                    title: format!("{experiment}: {}", self.units.label(single)),
                    y_label: self.units.label(single).to_string(),
                    series: vec![series],
                });
            }
        }
        charts
    }

    fn series(&self, table: &RunTable, column: &str, label: &str) -> Option<SeriesData> {
        let idx = table.columns().iter().position(|name| name == column)?;
        let points: Vec<(f64, f64)> = table
            .rows()
            .iter()
            .filter_map(|row| {
                let value = row.values.get(idx).copied().flatten()?;
                (value.is_finite() && row.time.is_finite()).then_some((row.time, value))
            })
            .collect();
        (!points.is_empty()).then(|| SeriesData {
            label: label.to_string(),
            points,
        })
    }

    /// Writes the charts of one experiment into `out_dir`.
    pub fn render_experiment(&self, experiment: &str, table: &RunTable, out_dir: &Path) -> RenderReport {
        let mut report = RenderReport::default();
        let charts = self.charts(experiment, table);
        if charts.is_empty() {
            warn!(experiment, "aggregate has nothing to plot");
            report
                .skipped
                .push((experiment.to_string(), "no plottable values".to_string()));
            return report;
        }
        if let Err(err) = ensure_dir(out_dir) {
            report.failed.push((experiment.to_string(), err.to_string()));
            return report;
        }
        for chart in &charts {
            let path = chart_path(out_dir, &chart.file_stem);
            match draw_single(&path, (self.width, self.height), chart, &self.time_column) {
                Ok(()) => {
                    debug!(path = %path.display(), "chart written");
                    report.charts.push(path);
                }
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "chart failed");
                    report.failed.push((chart.file_stem.clone(), err.to_string()));
                }
            }
        }
        let overview = chart_path(out_dir, &format!("{experiment}_overview_stacked"));
        let height = PANEL_HEIGHT.saturating_mul(charts.len() as u32);
        match draw_stacked(&overview, (self.width, height), &charts, &self.time_column) {
            Ok(()) => report.charts.push(overview),
            Err(err) => {
                warn!(path = %overview.display(), error = %err, "overview failed");
                report
                    .failed
                    .push((format!("{experiment}_overview_stacked"), err.to_string()));
            }
        }
        report
    }

    /// Loads an `avg_<experiment>.csv` file and renders it under
    /// `out_root/<experiment>/`.
    pub fn render_file(&self, path: &Path, out_root: &Path) -> RenderReport {
        let experiment = aggregate_experiment(path).unwrap_or_else(|| {
            path.file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
                .unwrap_or_default()
        });
        match RunTable::read(path, &self.time_column) {
            Ok(table) if table.rows().is_empty() => {
                warn!(experiment = %experiment, "aggregate is empty");
                RenderReport {
                    skipped: vec![(experiment, "empty aggregate".to_string())],
                    ..RenderReport::default()
                }
            }
            Ok(table) => self.render_experiment(&experiment, &table, &out_root.join(&experiment)),
            Err(err) => {
                warn!(path = %path.display(), error = %err, "cannot read aggregate");
                RenderReport {
                    failed: vec![(experiment, err.to_string())],
                    ..RenderReport::default()
                }
            }
        }
    }

    /// Renders every `avg_*.csv` directly inside `workspace`.
    pub fn render_workspace(&self, workspace: &Path, out_root: &Path) -> Result<RenderReport, BenchError> {
        let mut aggregates: Vec<PathBuf> = fs::read_dir(workspace)
            .map_err(|err| BenchError::io("workspace_read", workspace, err))?
            .filter_map(|entry| entry.ok().map(|entry| entry.path()))
            .filter(|path| path.is_file() && aggregate_experiment(path).is_some())
            .collect();
        aggregates.sort();
        info!(workspace = %workspace.display(), aggregates = aggregates.len(), "rendering charts");

        let reports: Vec<RenderReport> = aggregates
            .par_iter()
            .map(|path| self.render_file(path, out_root))
            .collect();
        let mut report = RenderReport::default();
        for part in reports {
            report.merge(part);
        }
        info!(
            charts = report.charts.len(),
            skipped = report.skipped.len(),
            failed = report.failed.len(),
            "rendering finished"
        );
        Ok(report)
    }
}

/// Experiment name encoded in an aggregate file path.
pub fn aggregate_experiment(path: &Path) -> Option<String> {
    let name = path.file_name()?.to_str()?;
    let experiment = name
        .strip_prefix(AGGREGATE_FILE_PREFIX)?
        .strip_suffix(TABLE_EXTENSION)?
        .strip_suffix('.')?;
    (!experiment.is_empty()).then(|| experiment.to_string())
}

fn chart_path(out_dir: &Path, stem: &str) -> PathBuf {
    out_dir.join(format!("{stem}.{CHART_EXTENSION}"))
}

fn sanitize(token: &str) -> String {
    token
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

fn draw_single(path: &Path, size: (u32, u32), chart: &ChartSpec, x_desc: &str) -> Result<(), BenchError> {
    let root = SVGBackend::new(path, size).into_drawing_area();
    draw_panel(&root, chart, x_desc)
        .and_then(|()| root.present().map_err(Into::into))
        .map_err(|err| render_error(path, err))
}

fn draw_stacked(path: &Path, size: (u32, u32), charts: &[ChartSpec], x_desc: &str) -> Result<(), BenchError> {
    let root = SVGBackend::new(path, size).into_drawing_area();
    let panels = root.split_evenly((charts.len(), 1));
    let drawn: Result<(), Box<dyn Error>> = panels
        .iter()
        .zip(charts)
        .try_for_each(|(panel, chart)| draw_panel(panel, chart, x_desc))
        .and_then(|()| root.present().map_err(Into::into));
    drawn.map_err(|err| render_error(path, err))
}

fn draw_panel(
    area: &DrawingArea<SVGBackend<'_>, Shift>,
    chart: &ChartSpec,
    x_desc: &str,
) -> Result<(), Box<dyn Error>> {
    area.fill(&WHITE)?;
    let points = || chart.series.iter().flat_map(|series| series.points.iter());
    let x_range = span(points().map(|(x, _)| *x), 0.0);
    let y_range = span(points().map(|(_, y)| *y), 0.05);

    let mut plot = ChartBuilder::on(area)
        .caption(&chart.title, ("sans-serif", 20))
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(70)
        .build_cartesian_2d(x_range, y_range)?;
    plot.configure_mesh()
        .x_desc(x_desc)
        .y_desc(chart.y_label.as_str())
        .draw()?;

    for (idx, series) in chart.series.iter().enumerate() {
        let color = Palette99::pick(idx).mix(0.9);
        plot.draw_series(LineSeries::new(series.points.iter().copied(), &color))?
            .label(series.label.as_str())
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color));
    }
    if chart.series.len() > 1 {
        plot.configure_series_labels()
            .background_style(WHITE.mix(0.8))
            .border_style(BLACK)
            .draw()?;
    }
    Ok(())
}

/// Value range covering `values`, padded by `pad` of its width; degenerate
/// spans are widened to a unit interval.
fn span(values: impl Iterator<Item = f64>, pad: f64) -> Range<f64> {
    let (min, max) = values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    });
    if !min.is_finite() || !max.is_finite() {
        return 0.0..1.0;
    }
    let width = max - min;
    if width <= f64::EPSILON * max.abs().max(1.0) {
        return (min - 0.5)..(max + 0.5);
    }
    (min - width * pad)..(max + width * pad)
}

fn render_error(path: &Path, err: Box<dyn Error>) -> BenchError {
    BenchError::Render(
        ErrorInfo::new("chart_draw", err.to_string()).with_context("path", path.display().to_string()),
    )
}
