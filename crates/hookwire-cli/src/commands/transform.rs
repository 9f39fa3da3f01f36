//! Transform a payload offline

use anyhow::Result;
use hookwire_core::{
    Consumer, NewConsumer, NewProducer, Producer, apply_defaults, transform_with_diagnostics,
    validate_consumer, validate_payload, validate_producer,
};
use serde_json::Value;

use super::{print_json, read_definition, read_json};

/// Run the transform command.
///
/// Problems are reported on stderr; the transformed payload is always
/// printed to stdout.
pub async fn run(producer_path: &str, consumer_path: &str, payload_path: &str) -> Result<()> {
    let producer_input: NewProducer = read_definition(producer_path)?;
    let consumer_input: NewConsumer = read_definition(consumer_path)?;
    let payload = read_json(payload_path)?;

    if let Err(e) = validate_producer(&producer_input) {
        tracing::warn!("{}", e);
    }
    let producer = Producer::create(producer_input);
    if let Err(e) = validate_consumer(&consumer_input, &producer) {
        tracing::warn!("{}", e);
    }
    let consumer = Consumer::create(consumer_input);

    let Value::Object(mut data) = payload else {
        anyhow::bail!("Payload in {} must be a JSON object", payload_path);
    };
    apply_defaults(&mut data, &producer);

    let validation = validate_payload(&Value::Object(data.clone()), &producer);
    for error in &validation.errors {
        tracing::warn!("✗ {}", error);
    }

    let (output, diagnostics) = transform_with_diagnostics(&data, &consumer, &producer);
    for diagnostic in &diagnostics {
        tracing::warn!("{} -> null: {}", diagnostic.key, diagnostic.message);
    }

    print_json(&Value::Object(output))
}
