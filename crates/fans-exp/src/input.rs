use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use fans_core::errors::{ErrorInfo, FansError};
use fans_store::{NodePayload, NodeRecord};
use serde_json::{Map, Value};

pub const INPUT_FILE: &str = "input.json";

/// Solver input document: one key per port. File nodes contribute their path.
pub fn build_input(inputs: &BTreeMap<String, NodeRecord>) -> Value {
    let map = inputs
        .iter()
        .map(|(port, node)| {
            let value = match &node.payload {
                NodePayload::Value(value) => value.to_json(),
                NodePayload::File { path, .. } => Value::String(path.clone()),
            };
            (port.clone(), value)
        })
        .collect::<Map<_, _>>();
    Value::Object(map)
}

pub fn write_input(
    inputs: &BTreeMap<String, NodeRecord>,
    job_dir: &Path,
) -> Result<PathBuf, FansError> {
    let path = job_dir.join(INPUT_FILE);
    let bytes = serde_json::to_vec_pretty(&build_input(inputs))
        .map_err(|err| FansError::serde("fans_exp.input_encode", err))?;
    fs::write(&path, bytes).map_err(|err| {
        FansError::Serde(
            ErrorInfo::new("fans_exp.input_write", err.to_string())
                .with_context("path", path.display().to_string()),
        )
    })?;
    Ok(path)
}
