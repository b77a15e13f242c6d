//! Plan and summary encodings.
//!
//! Plans are YAML, run summaries are canonical JSON: object keys sorted at
//! every depth so that two summaries of the same pass diff cleanly and the
//! plan hash recorded in them is stable across runs.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::errors::{BenchError, ErrorInfo};

fn decode_error(code: &str, path: &Path, err: impl ToString) -> BenchError {
    BenchError::Serde(
        ErrorInfo::new(code, err.to_string()).with_context("path", path.display().to_string()),
    )
}

fn sort_keys(value: Value) -> Value {
    match value {
        Value::Object(map) => map
            .into_iter()
            .map(|(key, value)| (key, sort_keys(value)))
            .collect::<BTreeMap<_, _>>()
            .into_iter()
            .collect(),
        Value::Array(values) => values.into_iter().map(sort_keys).collect(),
        scalar => scalar,
    }
}

/// Pretty JSON with sorted object keys and a trailing newline.
pub fn to_canonical_json_bytes<T: Serialize>(value: &T) -> Result<Vec<u8>, BenchError> {
    let value = serde_json::to_value(value)
        .map_err(|err| BenchError::Serde(ErrorInfo::new("json_encode", err.to_string())))?;
    let mut bytes = serde_json::to_vec_pretty(&sort_keys(value))
        .map_err(|err| BenchError::Serde(ErrorInfo::new("json_encode", err.to_string())))?;
    bytes.push(b'\n');
    Ok(bytes)
}

/// Reads and decodes a JSON file; `code` names the read in I/O errors.
pub fn read_json_file<T: DeserializeOwned>(path: &Path, code: &str) -> Result<T, BenchError> {
    let bytes = fs::read(path).map_err(|err| BenchError::io(code, path, err))?;
    serde_json::from_slice(&bytes).map_err(|err| decode_error("json_decode", path, err))
}

/// Reads and decodes a YAML file; `code` names the read in I/O errors.
pub fn read_yaml_file<T: DeserializeOwned>(path: &Path, code: &str) -> Result<T, BenchError> {
    let bytes = fs::read(path).map_err(|err| BenchError::io(code, path, err))?;
    serde_yaml::from_slice(&bytes).map_err(|err| decode_error("yaml_decode", path, err))
}

/// Encodes a value as YAML.
pub fn to_yaml_string<T: Serialize>(value: &T) -> Result<String, BenchError> {
    serde_yaml::to_string(value)
        .map_err(|err| BenchError::Serde(ErrorInfo::new("yaml_encode", err.to_string())))
}

/// Hex SHA-256 of the canonical JSON form of `value`.
pub fn stable_hash_string<T: Serialize>(value: &T) -> Result<String, BenchError> {
    let digest = Sha256::digest(to_canonical_json_bytes(value)?);
    Ok(format!("{digest:x}"))
}
