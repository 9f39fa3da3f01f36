//! Print a starter payload for a producer

use anyhow::Result;
use hookwire_core::{NewProducer, Producer, sample_payload};
use serde_json::Value;

use super::{print_json, read_definition};

/// Run the sample command
pub async fn run(producer_path: &str) -> Result<()> {
    let input: NewProducer = read_definition(producer_path)?;
    let producer = Producer::create(input);
    print_json(&Value::Object(sample_payload(&producer)))
}
