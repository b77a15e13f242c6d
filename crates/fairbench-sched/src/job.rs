use std::path::PathBuf;

use fairbench_core::errors::BenchError;
use fairbench_core::{ExperimentKey, ParameterGrid, ResultLayout, SeedPolicy};
use serde::{Deserialize, Serialize};

/// One simulator invocation: a grid cell, a repetition and its seed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobDescriptor {
    /// Grid cell the run belongs to.
    pub key: ExperimentKey,
    /// Repetition index, starting at 1.
    pub run: u32,
    /// Seed of the first attempt.
    pub seed: u64,
    /// Table written by the simulator.
    pub output: PathBuf,
    /// Captured stdout and stderr of the child process.
    pub log: PathBuf,
}

/// Enumerates grid cells × repetitions, cell-major, drawing one seed per job.
pub fn enumerate_jobs(
    grid: &ParameterGrid,
    repetitions: u32,
    layout: &ResultLayout,
    seeds: SeedPolicy,
) -> Result<Vec<JobDescriptor>, BenchError> {
    let keys = grid.experiments()?;
    let mut jobs = Vec::with_capacity(keys.len() * repetitions as usize);
    for key in keys {
        let name = key.name();
        for run in 1..=repetitions {
            jobs.push(JobDescriptor {
                seed: seeds.seed_for(&name, run, 1),
                output: layout.run_path(&key, run)?,
                log: layout.log_path(&key, run)?,
                key: key.clone(),
                run,
            });
        }
    }
    Ok(jobs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grid_times_repetitions() {
        let grid = ParameterGrid::new(["AllBbr", "RenoVsCubic"]);
        let layout = ResultLayout::new("results");
        let jobs = enumerate_jobs(&grid, 3, &layout, SeedPolicy::Derived { master: 1 })
            .expect("jobs");
        assert_eq!(jobs.len(), 12);
        assert_eq!(jobs[0].run, 1);
        assert_eq!(jobs[2].run, 3);
        assert_eq!(jobs[3].key.name(), "AllBbr_asymmetric");
        let outputs: std::collections::BTreeSet<_> = jobs.iter().map(|j| &j.output).collect();
        assert_eq!(outputs.len(), jobs.len());
    }

    #[test]
    fn independent_seeds_differ_between_repetitions() {
        let grid = ParameterGrid::new(["AllCubic"]);
        let layout = ResultLayout::new("results");
        let jobs = enumerate_jobs(&grid, 8, &layout, SeedPolicy::Independent).expect("jobs");
        let seeds: std::collections::BTreeSet<_> = jobs.iter().map(|j| j.seed).collect();
        assert!(seeds.len() > 1);
    }
}
