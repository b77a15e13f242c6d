use fairbench_agg::{MetricGroup, MetricGrouper};

#[test]
fn flow_metrics_group_by_suffix() {
    let groups = MetricGrouper::default().group(&["Time", "FlowA_Bps", "FlowB_Bps", "JainsIndex"]);
    assert_eq!(
        groups.groups,
        vec![MetricGroup {
            suffix: "Bps".to_string(),
            columns: vec!["FlowA_Bps".to_string(), "FlowB_Bps".to_string()],
        }]
    );
    assert_eq!(groups.singles, ["JainsIndex"]);
}

#[test]
fn groups_keep_first_seen_order_for_any_number_of_flows() {
    let mut columns = vec!["Time".to_string()];
    for flow in 0..12 {
        columns.push(format!("Flow{flow}_Cwnd"));
        columns.push(format!("Flow{flow}_Bps"));
    }
    columns.push("JainsFairnessIndex".to_string());
    let groups = MetricGrouper::default().group(&columns);
    let suffixes: Vec<&str> = groups.groups.iter().map(|g| g.suffix.as_str()).collect();
    assert_eq!(suffixes, ["Cwnd", "Bps"]);
    assert_eq!(groups.get("Bps").map(|g| g.columns.len()), Some(12));
    assert_eq!(groups.get("Bps").map(|g| g.columns[3].as_str()), Some("Flow3_Bps"));
    assert_eq!(groups.singles, ["JainsFairnessIndex"]);
}

#[test]
fn unknown_and_separator_less_suffixes_are_singles() {
    let grouper = MetricGrouper::default();
    let groups = grouper.group(&["Time", "Flow0_Jitter", "_Bps", "Bps", "Sender_1_PktLossPct"]);
    assert_eq!(groups.singles, ["Flow0_Jitter", "Bps"]);
    assert_eq!(groups.get("Bps").map(|g| g.columns.clone()), Some(vec!["_Bps".to_string()]));
    assert_eq!(grouper.entity_label("_Bps"), "_Bps");
    assert_eq!(groups.get("PktLossPct").map(|g| g.columns.clone()), Some(vec!["Sender_1_PktLossPct".to_string()]));
    assert_eq!(grouper.entity_label("Sender_1_PktLossPct"), "Sender_1");
    assert_eq!(grouper.entity_label("JainsIndex"), "JainsIndex");
}

#[test]
fn suffixes_separator_and_time_column_are_configurable() {
    let grouper = MetricGrouper::new(["goodput"], '.').with_time_column("t");
    let groups = grouper.group(&["t", "h1.goodput", "h1_Bps"]);
    assert_eq!(groups.get("goodput").map(|g| g.columns.clone()), Some(vec!["h1.goodput".to_string()]));
    assert_eq!(groups.singles, ["h1_Bps"]);
    assert_eq!(grouper.entity_label("h1.goodput"), "h1");
    assert!(MetricGrouper::default().group::<&str>(&[]).is_empty());
}
