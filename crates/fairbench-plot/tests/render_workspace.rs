use std::fs;

use fairbench_agg::{MetricGrouper, RunRow, RunTable};
use fairbench_plot::{ReportRenderer, UnitLabels};

const AGGREGATE: &str = "Time,Flow0_Bps,Flow1_Bps,Flow0_Cwnd,JainsFairnessIndex\n\
0.1,100.0,80.0,10.0,0.9\n\
0.2,120.0,90.0,12.0,\n\
0.3,110.0,95.0,14.0,0.95\n";

#[test]
fn charts_follow_metric_groups() {
    let table = RunTable::from_parts(
        vec!["A_Bps".into(), "B_Bps".into(), "Note".into(), "Silent_Rtt".into()],
        vec![true, true, false, true],
        vec![RunRow {
            time: 1.0,
            values: vec![Some(1.0), Some(2.0), None, None],
        }],
    );
    let renderer = ReportRenderer::default();
    let charts = renderer.charts("exp", &table);
    assert_eq!(charts.len(), 1);
    assert_eq!(charts[0].file_stem, "exp_Bps");
    assert_eq!(charts[0].y_label, "Throughput (Bytes/s)");
    let labels: Vec<&str> = charts[0].series.iter().map(|s| s.label.as_str()).collect();
    assert_eq!(labels, ["A", "B"]);
}

#[test]
fn unit_labels_are_injectable() {
    let table = RunTable::from_parts(
        vec!["h1.goodput".into()],
        vec![true],
        vec![RunRow {
            time: 0.0,
            values: vec![Some(3.0)],
        }],
    );
    let renderer = ReportRenderer::new(
        MetricGrouper::new(["goodput"], '.'),
        UnitLabels::from_pairs([("goodput", "Goodput (Mbit/s)")]),
    );
    let charts = renderer.charts("exp", &table);
    assert_eq!(charts[0].y_label, "Goodput (Mbit/s)");
    assert_eq!(charts[0].series[0].label, "h1");
}

#[test]
fn workspace_rendering_writes_svg_per_metric_and_overview() {
    let temp = tempfile::tempdir().expect("tmp dir");
    fs::write(temp.path().join("avg_AllBbr_symmetric.csv"), AGGREGATE).expect("aggregate");
    fs::write(temp.path().join("avg_AllCubic_symmetric.csv"), "Time,Flow0_Bps\n").expect("empty");
    fs::write(temp.path().join("notes.csv"), "Time,X\n1,2\n").expect("other");
    let plots = temp.path().join("plots");

    let report = ReportRenderer::default()
        .render_workspace(temp.path(), &plots)
        .expect("render");

    let dir = plots.join("AllBbr_symmetric");
    for name in [
        "AllBbr_symmetric_Bps.svg",
        "AllBbr_symmetric_Cwnd.svg",
        "AllBbr_symmetric_JainsFairnessIndex.svg",
        "AllBbr_symmetric_overview_stacked.svg",
    ] {
        let svg = fs::read_to_string(dir.join(name)).expect(name);
        assert!(svg.contains("<svg"), "{name} is not an svg document");
    }
    assert_eq!(report.charts.len(), 4);
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].0, "AllCubic_symmetric");
    assert!(report.failed.is_empty());
    assert!(!plots.join("AllCubic_symmetric").exists());
}

#[test]
fn missing_workspace_is_an_error() {
    let temp = tempfile::tempdir().expect("tmp dir");
    let result = ReportRenderer::default()
        .render_workspace(&temp.path().join("absent"), &temp.path().join("plots"));
    assert!(result.is_err());
}
