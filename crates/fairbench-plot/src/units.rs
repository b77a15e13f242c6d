use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Axis labels keyed by metric suffix or single metric name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitLabels {
    labels: BTreeMap<String, String>,
}

impl Default for UnitLabels {
    fn default() -> Self {
        Self::from_pairs([
            ("Bps", "Throughput (Bytes/s)"),
            ("PktLoss", "Packet Loss (pkts)"),
            ("PktLossPct", "Packet Loss (%)"),
            ("Cwnd", "CWND (segments)"),
            ("Rtt", "RTT (s)"),
            ("FairnessIndex", "Fairness Index"),
            ("JainsFairnessIndex", "Jain's Fairness Index"),
        ])
    }
}

impl UnitLabels {
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            labels: pairs
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        }
    }

    /// Label for `metric`, falling back to the metric name itself.
    pub fn label<'a>(&'a self, metric: &'a str) -> &'a str {
        self.labels.get(metric).map(String::as_str).unwrap_or(metric)
    }
}
