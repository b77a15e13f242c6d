//! Partitioning of aggregated column names into per-metric groups.

use serde::{Deserialize, Serialize};

use crate::table::DEFAULT_TIME_COLUMN;

/// Metric suffixes recognised out of the box.
pub const DEFAULT_SUFFIXES: [&str; 6] = [
    "Bps",
    "PktLoss",
    "PktLossPct",
    "Cwnd",
    "Rtt",
    "FairnessIndex",
];

/// Columns sharing one metric suffix, in first-seen order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricGroup {
    pub suffix: String,
    pub columns: Vec<String>,
}

/// Grouped columns plus the ones that matched no suffix.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MetricGroups {
    pub groups: Vec<MetricGroup>,
    pub singles: Vec<String>,
}

impl MetricGroups {
    pub fn get(&self, suffix: &str) -> Option<&MetricGroup> {
        self.groups.iter().find(|group| group.suffix == suffix)
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty() && self.singles.is_empty()
    }
}

/// Splits `<entity><sep><suffix>` column names by known suffix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricGrouper {
    suffixes: Vec<String>,
    separator: char,
    time_column: String,
}

impl Default for MetricGrouper {
    fn default() -> Self {
        Self::new(DEFAULT_SUFFIXES, '_')
    }
}

impl MetricGrouper {
    pub fn new<I, S>(suffixes: I, separator: char) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            suffixes: suffixes.into_iter().map(Into::into).collect(),
            separator,
            time_column: DEFAULT_TIME_COLUMN.to_string(),
        }
    }

    pub fn with_time_column(mut self, time_column: impl Into<String>) -> Self {
        self.time_column = time_column.into();
        self
    }

    pub fn suffixes(&self) -> &[String] {
        &self.suffixes
    }

    /// Known suffix of `column`, if it is a flow metric.
    pub fn suffix_of<'a>(&self, column: &'a str) -> Option<&'a str> {
        let (_, suffix) = column.rsplit_once(self.separator)?;
        self.suffixes
            .iter()
            .any(|known| known == suffix)
            .then_some(suffix)
    }

    /// Legend label: the column name without its metric suffix, or the whole
    /// name when nothing precedes the suffix.
    pub fn entity_label<'a>(&self, column: &'a str) -> &'a str {
        match self.suffix_of(column) {
            Some(suffix) => {
                let entity = &column[..column.len() - suffix.len() - self.separator.len_utf8()];
                if entity.is_empty() {
                    column
                } else {
                    entity
                }
            }
            None => column,
        }
    }

    /// Groups `columns`, skipping the time column.
    pub fn group<S: AsRef<str>>(&self, columns: &[S]) -> MetricGroups {
        let mut groups = MetricGroups::default();
        for column in columns.iter().map(AsRef::as_ref) {
            if column == self.time_column {
                continue;
            }
            match self.suffix_of(column) {
                Some(suffix) => match groups.groups.iter_mut().find(|g| g.suffix == suffix) {
                    Some(group) => group.columns.push(column.to_string()),
                    None => groups.groups.push(MetricGroup {
                        suffix: suffix.to_string(),
                        columns: vec![column.to_string()],
                    }),
                },
                None => groups.singles.push(column.to_string()),
            }
        }
        groups
    }
}
