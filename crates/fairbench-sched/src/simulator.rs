use std::env;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Command;

use fairbench_core::errors::{BenchError, ErrorInfo};
use serde::{Deserialize, Serialize};

use crate::job::JobDescriptor;

/// Flag names understood by the simulator, emitted as `--<flag>=<value>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatorFlags {
    /// Scenario identifier flag.
    pub scenario: String,
    /// Boolean RTT asymmetry flag.
    pub asymmetric_rtt: String,
    /// Random seed flag.
    pub seed: String,
    /// Destination table flag.
    pub output: String,
}

impl Default for SimulatorFlags {
    fn default() -> Self {
        Self {
            scenario: "scenario".to_string(),
            asymmetric_rtt: "asymmetricRtt".to_string(),
            seed: "seed".to_string(),
            output: "outputFile".to_string(),
        }
    }
}

/// External simulator executable and how to invoke it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulatorSpec {
    /// Program name (looked up on `PATH`) or path to the executable.
    pub program: PathBuf,
    /// Arguments placed before the per-job flags, e.g. `run scratch/script.cc --`.
    #[serde(default)]
    pub args: Vec<String>,
    /// Working directory of the child process.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<PathBuf>,
    /// Flag naming overrides.
    #[serde(default)]
    pub flags: SimulatorFlags,
}

impl SimulatorSpec {
    /// Invokes `program` with no prefix arguments.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            working_dir: None,
            flags: SimulatorFlags::default(),
        }
    }

    /// Resolves the executable, failing with `ExternalToolMissing` when it
    /// cannot be found.
    pub fn locate(&self) -> Result<PathBuf, BenchError> {
        let found = if self.program.components().count() > 1 {
            let candidate = match &self.working_dir {
                Some(dir) if self.program.is_relative() => dir.join(&self.program),
                _ => self.program.clone(),
            };
            is_executable(&candidate).then_some(candidate)
        } else {
            search_path(&self.program, env::var_os("PATH"))
        };
        found.ok_or_else(|| {
            BenchError::ExternalToolMissing(
                ErrorInfo::new("simulator_missing", "simulator executable not found")
                    .with_context("program", self.program.display().to_string())
                    .with_hint("set `simulator.program` to an existing executable"),
            )
        })
    }

    /// Builds the child process command for `job`.
    pub fn command(&self, program: &Path, job: &JobDescriptor, seed: u64) -> Command {
        let mut command = Command::new(program);
        command.args(&self.args);
        command.arg(format!("--{}={}", self.flags.scenario, job.key.scenario()));
        command.arg(format!(
            "--{}={}",
            self.flags.asymmetric_rtt,
            job.key.rtt().is_asymmetric()
        ));
        command.arg(format!("--{}={}", self.flags.seed, seed));
        command.arg(format!(
            "--{}={}",
            self.flags.output,
            job.output.display()
        ));
        for (name, value) in job.key.dimensions() {
            command.arg(format!("--{name}={value}"));
        }
        if let Some(dir) = &self.working_dir {
            command.current_dir(dir);
        }
        command
    }
}

fn search_path(program: &Path, path_var: Option<OsString>) -> Option<PathBuf> {
    let path_var = path_var?;
    env::split_paths(&path_var).find_map(|dir| {
        let candidate = dir.join(program);
        if is_executable(&candidate) {
            return Some(candidate);
        }
        if cfg!(windows) {
            let exe = candidate.with_extension("exe");
            if is_executable(&exe) {
                return Some(exe);
            }
        }
        None
    })
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_program_is_reported_before_dispatch() {
        let spec = SimulatorSpec::new("definitely-not-a-simulator-binary");
        let err = spec.locate().unwrap_err();
        assert!(matches!(err, BenchError::ExternalToolMissing(_)));
    }

    #[test]
    fn missing_relative_path_is_reported() {
        let mut spec = SimulatorSpec::new("./ns3");
        spec.working_dir = Some(PathBuf::from("/nonexistent/ns-3-dev"));
        assert!(spec.locate().is_err());
    }

    #[test]
    fn path_search_skips_empty_entries() {
        assert_eq!(search_path(Path::new("ns3"), None), None);
    }
}
