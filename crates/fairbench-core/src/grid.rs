//! Parameter grid description and Cartesian expansion.

use serde::{Deserialize, Serialize};

use crate::errors::{BenchError, ErrorInfo};
use crate::key::{ExperimentKey, RttMode};

/// Extra named dimension of the grid, forwarded to the simulator verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridDimension {
    pub name: String,
    pub values: Vec<String>,
}

/// Parameter grid: scenarios × RTT modes × every extra dimension.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterGrid {
    pub scenarios: Vec<String>,
    #[serde(default = "ParameterGrid::default_rtt_modes")]
    pub rtt_modes: Vec<RttMode>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dimensions: Vec<GridDimension>,
}

impl ParameterGrid {
    fn default_rtt_modes() -> Vec<RttMode> {
        RttMode::ALL.to_vec()
    }

    /// Grid over `scenarios` with both RTT modes and no extra dimensions.
    pub fn new<I, S>(scenarios: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            scenarios: scenarios.into_iter().map(Into::into).collect(),
            rtt_modes: Self::default_rtt_modes(),
            dimensions: Vec::new(),
        }
    }

    /// Number of cells in the grid.
    pub fn len(&self) -> usize {
        self.dimensions
            .iter()
            .fold(self.scenarios.len() * self.rtt_modes.len(), |acc, dim| {
                acc * dim.values.len()
            })
    }

    /// True when the grid has no cells.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Expands the grid into one key per cell, scenario-major.
    ///
    /// Fails on the first component that is not a valid key token or when two
    /// cells would map to the same experiment name.
    pub fn experiments(&self) -> Result<Vec<ExperimentKey>, BenchError> {
        let mut outputs = Vec::with_capacity(self.len());
        for scenario in &self.scenarios {
            for &rtt in &self.rtt_modes {
                let base = ExperimentKey::new(scenario.clone(), rtt)?;
                expand_dimensions(&self.dimensions, 0, base, &mut outputs)?;
            }
        }
        let mut names: Vec<String> = outputs.iter().map(ExperimentKey::name).collect();
        names.sort_unstable();
        if let Some(pair) = names.windows(2).find(|pair| pair[0] == pair[1]) {
            return Err(BenchError::Config(
                ErrorInfo::new("duplicate_cell", "parameter grid lists the same cell twice")
                    .with_context("experiment", pair[0].clone()),
            ));
        }
        Ok(outputs)
    }
}

fn expand_dimensions(
    dims: &[GridDimension],
    idx: usize,
    current: ExperimentKey,
    outputs: &mut Vec<ExperimentKey>,
) -> Result<(), BenchError> {
    if idx == dims.len() {
        outputs.push(current);
        return Ok(());
    }
    let dim = &dims[idx];
    for value in &dim.values {
        let next = current.clone().with_dimension(dim.name.clone(), value.clone())?;
        expand_dimensions(dims, idx + 1, next, outputs)?;
    }
    Ok(())
}
