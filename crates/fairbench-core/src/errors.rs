//! Structured error types shared across fairbench crates.

use std::collections::BTreeMap;
use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Code, message and context carried by every [`BenchError`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Stable snake_case identifier, e.g. `simulator_missing`.
    pub code: String,
    /// What went wrong.
    pub message: String,
    /// Paths, experiment names and run indices involved.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub context: BTreeMap<String, String>,
    /// Suggested fix, when one is known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl ErrorInfo {
    /// Payload without context or hint.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        ErrorInfo {
            code: code.into(),
            message: message.into(),
            context: BTreeMap::default(),
            hint: None,
        }
    }

    /// Records `key=value` context.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// Attaches a remediation hint.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

/// Canonical error type for the fairbench pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(tag = "family", content = "detail")]
pub enum BenchError {
    /// An experiment key component cannot be rendered as a path token.
    #[error("invalid key: {0}")]
    InvalidKey(ErrorInfo),
    /// The simulator executable could not be located.
    #[error("external tool missing: {0}")]
    ExternalToolMissing(ErrorInfo),
    /// Plan or option validation errors.
    #[error("config error: {0}")]
    Config(ErrorInfo),
    /// A single simulator invocation could not be carried out.
    #[error("job error: {0}")]
    Job(ErrorInfo),
    /// Missing or malformed run data.
    #[error("data error: {0}")]
    Data(ErrorInfo),
    /// Filesystem errors.
    #[error("io error: {0}")]
    Io(ErrorInfo),
    /// Serialization and schema errors.
    #[error("serde error: {0}")]
    Serde(ErrorInfo),
    /// Chart rendering errors.
    #[error("render error: {0}")]
    Render(ErrorInfo),
}

impl Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)?;
        let mut pairs = self.context.iter();
        if let Some((key, value)) = pairs.next() {
            write!(f, " ({key}={value}")?;
            for (key, value) in pairs {
                write!(f, ", {key}={value}")?;
            }
            f.write_str(")")?;
        }
        match &self.hint {
            Some(hint) => write!(f, "; hint: {hint}"),
            None => Ok(()),
        }
    }
}

impl BenchError {
    /// Payload of any variant.
    pub fn info(&self) -> &ErrorInfo {
        match self {
            BenchError::InvalidKey(info)
            | BenchError::ExternalToolMissing(info)
            | BenchError::Config(info)
            | BenchError::Job(info)
            | BenchError::Data(info)
            | BenchError::Io(info)
            | BenchError::Serde(info)
            | BenchError::Render(info) => info,
        }
    }

    /// Configuration-class errors abort a pass before any work is dispatched.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            BenchError::InvalidKey(_) | BenchError::ExternalToolMissing(_) | BenchError::Config(_)
        )
    }

    /// Wraps an I/O failure on `path` under the given error code.
    pub fn io(code: &str, path: &std::path::Path, err: impl ToString) -> Self {
        BenchError::Io(
            ErrorInfo::new(code, err.to_string()).with_context("path", path.display().to_string()),
        )
    }
}
