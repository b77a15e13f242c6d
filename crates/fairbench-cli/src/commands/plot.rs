use std::error::Error;
use std::path::{Path, PathBuf};

use clap::Args as ClapArgs;
use fairbench_agg::DEFAULT_TIME_COLUMN;
use fairbench_plot::{RenderReport, ReportRenderer};

use super::print_render;

#[derive(ClapArgs, Debug)]
pub struct PlotArgs {
    /// Directory holding the `avg_*.csv` aggregates.
    #[arg(long)]
    pub workspace: PathBuf,
    /// Chart output directory; defaults to `<workspace>/plots`.
    #[arg(long)]
    pub out: Option<PathBuf>,
    /// Name of the time key column.
    #[arg(long, default_value = DEFAULT_TIME_COLUMN)]
    pub time_column: String,
}

pub fn run(args: &PlotArgs, json: bool) -> Result<bool, Box<dyn Error>> {
    let report = render(&args.workspace, args.out.as_deref(), &args.time_column)?;
    print_render(&report, json)?;
    Ok(report.failed.is_empty())
}

pub(crate) fn render(
    workspace: &Path,
    out: Option<&Path>,
    time_column: &str,
) -> Result<RenderReport, Box<dyn Error>> {
    let out = out
        .map(Path::to_path_buf)
        .unwrap_or_else(|| workspace.join("plots"));
    let renderer = ReportRenderer::default().with_time_column(time_column);
    Ok(renderer.render_workspace(workspace, &out)?)
}
