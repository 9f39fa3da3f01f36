//! Evaluate a mapping expression

use anyhow::{Context, Result};
use hookwire_core::try_evaluate_expression;
use serde_json::{Map, Value};

use super::{print_json, read_json};

/// Run the eval command
pub async fn run(expression: &str, data: Option<&str>) -> Result<()> {
    let data = match data {
        Some(source) => match read_json(source)? {
            Value::Object(map) => map,
            _ => anyhow::bail!("Data must be a JSON object"),
        },
        None => Map::new(),
    };

    let value = try_evaluate_expression(expression, &data)
        .with_context(|| format!("Failed to evaluate '{expression}'"))?;
    print_json(&value)
}
