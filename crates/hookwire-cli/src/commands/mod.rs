//! CLI command implementations

pub mod eval;
pub mod init;
pub mod sample;
pub mod serve;
pub mod transform;
pub mod validate;

use anyhow::{Context, Result};
use serde_json::Value;
use std::path::Path;

/// Read a YAML (or JSON) definition file
pub(crate) fn read_definition<T: serde::de::DeserializeOwned>(path: &str) -> Result<T> {
    let contents =
        std::fs::read_to_string(path).with_context(|| format!("Failed to read {path}"))?;
    serde_yaml::from_str(&contents).with_context(|| format!("Failed to parse {path}"))
}

/// Parse inline JSON, or read it from a file when `source` names one
pub(crate) fn read_json(source: &str) -> Result<Value> {
    if Path::new(source).is_file() {
        let contents = std::fs::read_to_string(source)
            .with_context(|| format!("Failed to read {source}"))?;
        serde_json::from_str(&contents).with_context(|| format!("Failed to parse {source} as JSON"))
    } else {
        serde_json::from_str(source).context("Failed to parse inline JSON")
    }
}

/// Print a JSON value to stdout
pub(crate) fn print_json(value: &Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
