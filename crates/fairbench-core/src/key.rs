//! Experiment keys: one cell of the parameter grid and its on-disk name.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::{BenchError, ErrorInfo};

/// Separator between experiment name components.
pub const COMPONENT_SEPARATOR: char = '_';
/// Separator between an extra dimension's name and its value.
pub const DIMENSION_SEPARATOR: char = '-';

const MAX_TOKEN_LEN: usize = 96;

/// Round-trip time configuration of the dumbbell senders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RttMode {
    /// Both senders see the same propagation delay.
    Symmetric,
    /// Senders see different propagation delays.
    Asymmetric,
}

impl RttMode {
    /// Both modes, symmetric first.
    pub const ALL: [RttMode; 2] = [RttMode::Symmetric, RttMode::Asymmetric];

    /// Maps the simulator's boolean flag onto a mode.
    pub fn from_flag(asymmetric: bool) -> Self {
        if asymmetric {
            RttMode::Asymmetric
        } else {
            RttMode::Symmetric
        }
    }

    /// Returns true for [`RttMode::Asymmetric`].
    pub fn is_asymmetric(self) -> bool {
        matches!(self, RttMode::Asymmetric)
    }

    /// Label used as the last experiment name component.
    pub fn label(self) -> &'static str {
        match self {
            RttMode::Symmetric => "symmetric",
            RttMode::Asymmetric => "asymmetric",
        }
    }
}

impl fmt::Display for RttMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for RttMode {
    type Err = BenchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "symmetric" => Ok(RttMode::Symmetric),
            "asymmetric" => Ok(RttMode::Asymmetric),
            other => Err(BenchError::InvalidKey(
                ErrorInfo::new("rtt_mode", "unknown RTT mode label")
                    .with_context("label", other)
                    .with_hint("expected `symmetric` or `asymmetric`"),
            )),
        }
    }
}

/// Immutable identifier of one point in the parameter grid.
///
/// The experiment name is `<scenario>[_<dim>-<value>...]_<rtt>`. Token rules
/// keep the mapping injective: scenarios and values never contain `_`, and
/// dimension names are plain alphanumerics, so [`ExperimentKey::parse`] can
/// always recover the components.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "KeyRepr", into = "KeyRepr")]
pub struct ExperimentKey {
    scenario: String,
    rtt: RttMode,
    dimensions: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct KeyRepr {
    scenario: String,
    rtt: RttMode,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    dimensions: BTreeMap<String, String>,
}

impl TryFrom<KeyRepr> for ExperimentKey {
    type Error = BenchError;

    fn try_from(repr: KeyRepr) -> Result<Self, Self::Error> {
        let mut key = ExperimentKey::new(repr.scenario, repr.rtt)?;
        for (name, value) in repr.dimensions {
            key = key.with_dimension(name, value)?;
        }
        Ok(key)
    }
}

impl From<ExperimentKey> for KeyRepr {
    fn from(key: ExperimentKey) -> Self {
        KeyRepr {
            scenario: key.scenario,
            rtt: key.rtt,
            dimensions: key.dimensions,
        }
    }
}

impl ExperimentKey {
    /// Creates a key for a scenario and RTT mode.
    pub fn new(scenario: impl Into<String>, rtt: RttMode) -> Result<Self, BenchError> {
        let scenario = scenario.into();
        validate_token("scenario", &scenario, |c| {
            c.is_ascii_alphanumeric() || matches!(c, '.' | '+' | '-')
        })?;
        if scenario.starts_with('.') {
            return Err(invalid("scenario", &scenario, "must not start with `.`"));
        }
        Ok(Self {
            scenario,
            rtt,
            dimensions: BTreeMap::new(),
        })
    }

    /// Adds an extra grid dimension forwarded to the simulator as `--<name>=<value>`.
    pub fn with_dimension(
        mut self,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<Self, BenchError> {
        let name = name.into();
        let value = value.into();
        validate_token("dimension", &name, |c| c.is_ascii_alphanumeric())?;
        validate_token("value", &value, |c| {
            c.is_ascii_alphanumeric() || matches!(c, '.' | '+' | '-')
        })?;
        if self.dimensions.contains_key(&name) {
            return Err(invalid("dimension", &name, "dimension set twice"));
        }
        self.dimensions.insert(name, value);
        Ok(self)
    }

    /// Scenario identifier passed to the simulator.
    pub fn scenario(&self) -> &str {
        &self.scenario
    }

    /// RTT mode of the experiment.
    pub fn rtt(&self) -> RttMode {
        self.rtt
    }

    /// Extra grid dimensions in name order.
    pub fn dimensions(&self) -> &BTreeMap<String, String> {
        &self.dimensions
    }

    /// Filesystem-safe experiment name.
    pub fn name(&self) -> String {
        let mut name = self.scenario.clone();
        for (dim, value) in &self.dimensions {
            name.push(COMPONENT_SEPARATOR);
            name.push_str(dim);
            name.push(DIMENSION_SEPARATOR);
            name.push_str(value);
        }
        name.push(COMPONENT_SEPARATOR);
        name.push_str(self.rtt.label());
        name
    }

    /// Recovers a key from an experiment name produced by [`ExperimentKey::name`].
    pub fn parse(name: &str) -> Result<Self, BenchError> {
        let mut parts: Vec<&str> = name.split(COMPONENT_SEPARATOR).collect();
        if parts.len() < 2 {
            return Err(invalid("experiment", name, "missing RTT component"));
        }
        let rtt: RttMode = parts.pop().unwrap_or_default().parse()?;
        let mut key = ExperimentKey::new(parts[0], rtt)?;
        for part in &parts[1..] {
            let Some((dim, value)) = part.split_once(DIMENSION_SEPARATOR) else {
                return Err(invalid("experiment", name, "dimension without value"));
            };
            key = key.with_dimension(dim, value)?;
        }
        Ok(key)
    }
}

impl fmt::Display for ExperimentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

fn validate_token(
    field: &str,
    token: &str,
    allowed: impl Fn(char) -> bool,
) -> Result<(), BenchError> {
    if token.is_empty() {
        return Err(invalid(field, token, "empty component"));
    }
    if token.len() > MAX_TOKEN_LEN {
        return Err(invalid(field, token, "component too long"));
    }
    if let Some(bad) = token.chars().find(|c| !allowed(*c)) {
        return Err(invalid(
            field,
            token,
            format!("character {bad:?} is not filesystem safe"),
        ));
    }
    Ok(())
}

fn invalid(field: &str, token: &str, message: impl Into<String>) -> BenchError {
    BenchError::InvalidKey(
        ErrorInfo::new(format!("invalid_{field}"), message)
            .with_context(field, token)
            .with_hint("use ASCII letters, digits, `.`, `+` and `-`"),
    )
}
