use std::fs;
use std::path::Path;

use fairbench_agg::{Aggregate, RunTable, SeriesAggregator};
use fairbench_core::BenchError;
use proptest::prelude::*;

fn write(dir: &Path, name: &str, body: &str) {
    fs::create_dir_all(dir).expect("experiment dir");
    fs::write(dir.join(name), body).expect("write run");
}

fn table(result: &Aggregate) -> &fairbench_agg::AggregatedTable {
    result.table().expect("aggregated table")
}

#[test]
fn averages_over_the_runs_reporting_each_time_key() {
    let temp = tempfile::tempdir().expect("tmp dir");
    let dir = temp.path().join("AllBbr_symmetric");
    write(&dir, "run_001.csv", "Time,Flow0_Bps\n1.0,10\n2.0,40\n");
    write(&dir, "run_002.csv", "Time,Flow0_Bps\n1.0,20\n2.0,60\n");
    write(&dir, "run_003.csv", "Time,Flow0_Bps\n1.0,30\n");

    let aggregate = SeriesAggregator::default().aggregate(&dir).expect("aggregate");
    assert_eq!(aggregate.runs_used, 3);
    let table = table(&aggregate.result);
    assert_eq!(table.columns, ["Flow0_Bps"]);
    let rows: Vec<(f64, Option<f64>)> = table.rows.iter().map(|row| (row.time, row.values[0])).collect();
    assert_eq!(rows, [(1.0, Some(20.0)), (2.0, Some(50.0))]);
    assert_eq!(
        String::from_utf8(table.to_csv_bytes().expect("csv")).expect("utf8"),
        "Time,Flow0_Bps\n1.0,20.0\n2.0,50.0\n"
    );
}

#[test]
fn rows_keep_first_seen_time_order() {
    let temp = tempfile::tempdir().expect("tmp dir");
    let dir = temp.path().join("exp");
    write(&dir, "run_001.csv", "Time,A_Cwnd\n0.5,1\n0.1,2\n");
    write(&dir, "run_002.csv", "Time,A_Cwnd\n0.3,3\n0.5,5\n");
    let aggregate = SeriesAggregator::default().aggregate(&dir).expect("aggregate");
    let times: Vec<f64> = table(&aggregate.result).rows.iter().map(|row| row.time).collect();
    assert_eq!(times, [0.5, 0.1, 0.3]);
}

#[test]
fn empty_directory_is_an_explicit_empty_result() {
    let temp = tempfile::tempdir().expect("tmp dir");
    let dir = temp.path().join("exp");
    fs::create_dir_all(&dir).expect("dir");
    fs::write(dir.join("run_001.log"), "not a table").expect("log");
    let aggregate = SeriesAggregator::default().aggregate(&dir).expect("aggregate");
    assert_eq!(aggregate.result, Aggregate::Empty);
    assert_eq!(aggregate.runs_used, 0);
}

#[test]
fn header_only_runs_give_a_zero_row_table() {
    let temp = tempfile::tempdir().expect("tmp dir");
    let dir = temp.path().join("exp");
    write(&dir, "run_001.csv", "# comment\nTime,A_Bps\n");
    let aggregate = SeriesAggregator::default().aggregate(&dir).expect("aggregate");
    let table = table(&aggregate.result);
    assert_eq!(table.columns, ["A_Bps"]);
    assert!(table.rows.is_empty());
}

#[test]
fn missing_directory_is_a_data_error() {
    let temp = tempfile::tempdir().expect("tmp dir");
    let err = SeriesAggregator::default()
        .aggregate(&temp.path().join("absent"))
        .unwrap_err();
    assert!(matches!(err, BenchError::Data(_)));
}

#[test]
fn truncated_runs_are_skipped_with_a_diagnostic() {
    let temp = tempfile::tempdir().expect("tmp dir");
    let dir = temp.path().join("exp");
    write(&dir, "run_001.csv", "Time,A_Bps,B_Bps\n1.0,10,20\n");
    write(&dir, "run_002.csv", "Time,A_Bps,B_Bps\n1.0,30,40\n2.0,5");
    write(&dir, "run_003.csv", "");
    let aggregate = SeriesAggregator::default().aggregate(&dir).expect("aggregate");
    assert_eq!(aggregate.runs_used, 1);
    assert_eq!(aggregate.skipped.len(), 2);
    assert!(aggregate.skipped[0].path.ends_with("run_002.csv"));
    let table = table(&aggregate.result);
    assert_eq!(table.rows.len(), 1);
    assert_eq!(table.rows[0].values, [Some(10.0), Some(20.0)]);
}

#[test]
fn only_numbered_run_tables_are_averaged() {
    let temp = tempfile::tempdir().expect("tmp dir");
    let dir = temp.path().join("exp");
    write(&dir, "run_001.csv", "Time,A_Bps\n1.0,10\n");
    for name in ["run_abc.csv", "run_000.csv", "run_.csv", "run_002.csv.partial", "avg_exp.csv"] {
        write(&dir, name, "Time,A_Bps\n1.0,1000\n");
    }
    let aggregate = SeriesAggregator::default().aggregate(&dir).expect("aggregate");
    assert_eq!(aggregate.runs_used, 1);
    assert!(aggregate.skipped.is_empty());
    assert_eq!(table(&aggregate.result).rows[0].values, [Some(10.0)]);
}

#[test]
fn runs_beyond_the_repetition_limit_are_ignored() {
    let temp = tempfile::tempdir().expect("tmp dir");
    let dir = temp.path().join("exp");
    write(&dir, "run_001.csv", "Time,A_Bps\n1.0,10\n");
    write(&dir, "run_002.csv", "Time,A_Bps\n1.0,20\n");
    write(&dir, "run_003.csv", "Time,A_Bps\n1.0,90\n");
    let aggregate = SeriesAggregator::default()
        .with_max_runs(2)
        .aggregate(&dir)
        .expect("aggregate");
    assert_eq!(aggregate.runs_used, 2);
    assert_eq!(table(&aggregate.result).rows[0].values, [Some(15.0)]);
}

#[test]
fn all_runs_unreadable_is_empty() {
    let temp = tempfile::tempdir().expect("tmp dir");
    let dir = temp.path().join("exp");
    write(&dir, "run_001.csv", "Seconds,A_Bps\n1.0,1\n");
    let aggregate = SeriesAggregator::default().aggregate(&dir).expect("aggregate");
    assert_eq!(aggregate.result, Aggregate::Empty);
    assert_eq!(aggregate.skipped.len(), 1);
}

#[test]
fn non_numeric_columns_are_dropped_and_blanks_are_missing() {
    let temp = tempfile::tempdir().expect("tmp dir");
    let dir = temp.path().join("exp");
    write(&dir, "run_001.csv", "Time , Label, A_Bps\n1.0, x , \n2.0,y,4\n");
    write(&dir, "run_002.csv", "Time,Label,A_Bps\n1.0,z,6\n2.0,w,8\n");
    let aggregate = SeriesAggregator::default().aggregate(&dir).expect("aggregate");
    let table = table(&aggregate.result);
    assert_eq!(table.columns, ["A_Bps"]);
    assert_eq!(table.rows[0].values, [Some(6.0)]);
    assert_eq!(table.rows[1].values, [Some(6.0)]);
}

#[test]
fn configurable_time_column_and_ragged_columns() {
    let temp = tempfile::tempdir().expect("tmp dir");
    let dir = temp.path().join("exp");
    write(&dir, "run_001.csv", "t,A_Rtt\n1,0.25\n");
    write(&dir, "run_002.csv", "t,B_Rtt,A_Rtt\n1,0.5,0.75\n");
    let aggregate = SeriesAggregator::new("t").aggregate(&dir).expect("aggregate");
    let table = table(&aggregate.result);
    assert_eq!(table.time_column, "t");
    assert_eq!(table.columns, ["A_Rtt", "B_Rtt"]);
    assert_eq!(table.rows[0].values, [Some(0.5), Some(0.5)]);
}

#[test]
fn reaggregation_is_byte_identical() {
    let temp = tempfile::tempdir().expect("tmp dir");
    let root = temp.path().join("results");
    write(
        &root.join("AllCubic_asymmetric"),
        "run_001.csv",
        "# sim\nTime,A_Bps,JainsFairnessIndex\n0.1,1.5,0.75\n0.2,3,1\n",
    );
    write(
        &root.join("AllCubic_asymmetric"),
        "run_002.csv",
        "Time,A_Bps,JainsFairnessIndex\n0.1,2.25,0.25\n",
    );
    let aggregator = SeriesAggregator::default();
    let first_report = aggregator.aggregate_all(&root).expect("first pass");
    let output = temp.path().join("avg_AllCubic_asymmetric.csv");
    let first = fs::read(&output).expect("aggregate file");
    aggregator.aggregate_all(&root).expect("second pass");
    assert_eq!(fs::read(&output).expect("aggregate file"), first);
    assert_eq!(
        String::from_utf8(first).expect("utf8"),
        "Time,A_Bps,JainsFairnessIndex\n0.1,1.875,0.5\n0.2,3.0,1.0\n"
    );
    assert!(first_report.is_clean());
}

#[test]
fn aggregate_all_reports_every_experiment() {
    let temp = tempfile::tempdir().expect("tmp dir");
    let root = temp.path().join("results");
    write(&root.join("AllBbr_symmetric"), "run_001.csv", "Time,A_Bps\n1,2\n");
    write(&root.join("AllBbr_asymmetric"), "run_001.csv", "Time,A_Bps\n1,2");
    write(&root.join("AllBbr_asymmetric"), "run_002.csv", "broken\n1,2,3\n");
    fs::create_dir_all(root.join("AllDctcp_symmetric")).expect("empty experiment");
    fs::write(root.join("run_summary.json"), "{}").expect("summary");

    let report = SeriesAggregator::default().aggregate_all(&root).expect("aggregate");
    let written: Vec<&str> = report.written.iter().map(|w| w.experiment.as_str()).collect();
    assert_eq!(written, ["AllBbr_asymmetric", "AllBbr_symmetric"]);
    assert_eq!(report.empty, ["AllDctcp_symmetric"]);
    assert_eq!(report.skipped_runs.len(), 1);
    assert!(report.failed.is_empty());
    assert!(!temp.path().join("avg_AllDctcp_symmetric.csv").exists());
    assert!(temp.path().join("avg_AllBbr_symmetric.csv").is_file());
}

#[test]
fn missing_root_is_an_error() {
    let temp = tempfile::tempdir().expect("tmp dir");
    assert!(SeriesAggregator::default()
        .aggregate_all(&temp.path().join("nothing"))
        .is_err());
}

fn run_table(rows: &[(u8, f64)]) -> RunTable {
    let rows = rows
        .iter()
        .map(|&(time, value)| fairbench_agg::RunRow {
            time: f64::from(time),
            values: vec![Some(value)],
        })
        .collect();
    RunTable::from_parts(vec!["A_Bps".to_string()], vec![true], rows)
}

fn sorted_bits(aggregate: &Aggregate) -> Vec<(u64, Option<u64>)> {
    let mut rows: Vec<(u64, Option<u64>)> = aggregate
        .table()
        .map(|table| {
            table
                .rows
                .iter()
                .map(|row| (row.time.to_bits(), row.values[0].map(f64::to_bits)))
                .collect()
        })
        .unwrap_or_default();
    rows.sort();
    rows
}

#[test]
fn fractional_means_do_not_depend_on_run_order() {
    let tables: Vec<RunTable> = [0.1, 0.2, 0.3]
        .iter()
        .map(|&value| run_table(&[(1, value)]))
        .collect();
    let aggregator = SeriesAggregator::default();
    let csv = |aggregate: Aggregate| {
        let bytes = aggregate.table().expect("table").to_csv_bytes().expect("csv");
        String::from_utf8(bytes).expect("utf8")
    };
    let forward = csv(aggregator.aggregate_tables(&tables));
    let backward = csv(aggregator.aggregate_tables(tables.iter().rev()));
    assert_eq!(forward, backward);
    assert_eq!(forward, format!("Time,A_Bps\n1.0,{}\n", 0.6 / 3.0));
}

proptest! {
    #[test]
    fn aggregation_is_order_independent_up_to_row_order(
        runs in prop::collection::vec(
            prop::collection::vec((0u8..6, -1.0e6f64..1.0e6), 0..8),
            1..6,
        ),
        rotate in 0usize..6,
    ) {
        let tables: Vec<RunTable> = runs.iter().map(|rows| run_table(rows)).collect();
        let aggregator = SeriesAggregator::default();
        let forward = aggregator.aggregate_tables(&tables);
        let backward = aggregator.aggregate_tables(tables.iter().rev());
        let mut rotated: Vec<&RunTable> = tables.iter().collect();
        rotated.rotate_left(rotate % tables.len());
        let rotated = aggregator.aggregate_tables(rotated);
        prop_assert_eq!(sorted_bits(&forward), sorted_bits(&backward));
        prop_assert_eq!(sorted_bits(&forward), sorted_bits(&rotated));
    }
}
