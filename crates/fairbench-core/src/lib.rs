#![deny(missing_docs)]
#![doc = "Experiment keys, result addressing, seed policies and structured errors shared by the fairbench crates."]

pub mod addressing;
pub mod errors;
#[allow(missing_docs)]
pub mod grid;
pub mod key;
pub mod rng;
/// Canonical JSON/YAML helpers and stable hashing.
pub mod serde;

pub use addressing::{
    ensure_dir, parse_run_file_name, run_file_name, ResultLayout, AGGREGATE_FILE_PREFIX,
    RUN_FILE_PREFIX, TABLE_EXTENSION,
};
pub use errors::{BenchError, ErrorInfo};
pub use grid::{GridDimension, ParameterGrid};
pub use key::{ExperimentKey, RttMode};
pub use rng::{derive_substream_seed, SeedPolicy};
