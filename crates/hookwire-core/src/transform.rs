//! Payload transformer
//!
//! Applies a consumer's attribute mappings to a producer payload. Each
//! mapping is isolated: a failing attribute becomes `null` in the output
//! and the rest of the payload is still produced.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::consumer::{Consumer, ConsumerAttribute, MappingType};
use crate::error::{Error, Result};
use crate::expression::try_evaluate_expression;
use crate::producer::Producer;

/// A mapping that fell back to `null`
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct MappingDiagnostic {
    /// Consumer attribute key
    pub key: String,
    /// Why the mapping failed
    pub message: String,
}

/// Transform a producer payload into a consumer's outbound payload.
///
/// Output keys follow consumer declaration order; unmapped producer
/// attributes are never included.
pub fn transform_payload(
    producer_data: &Map<String, Value>,
    consumer: &Consumer,
    producer: &Producer,
) -> Map<String, Value> {
    transform_with_diagnostics(producer_data, consumer, producer).0
}

/// Like [`transform_payload`], also returning the mappings that failed
pub fn transform_with_diagnostics(
    producer_data: &Map<String, Value>,
    consumer: &Consumer,
    producer: &Producer,
) -> (Map<String, Value>, Vec<MappingDiagnostic>) {
    if consumer.producer_id != producer.id {
        tracing::warn!(
            consumer = %consumer.id,
            expected = %consumer.producer_id,
            actual = %producer.id,
            "transforming payload from a producer the consumer is not bound to"
        );
    }

    let mut output = Map::with_capacity(consumer.attributes.len());
    let mut diagnostics = Vec::new();
    for attr in &consumer.attributes {
        let value = match map_attribute(attr, producer_data) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(
                    consumer = %consumer.id,
                    key = %attr.key,
                    error = %e,
                    "error transforming attribute"
                );
                diagnostics.push(MappingDiagnostic {
                    key: attr.key.clone(),
                    message: e.to_string(),
                });
                Value::Null
            }
        };
        output.insert(attr.key.clone(), value);
    }
    (output, diagnostics)
}

fn map_attribute(attr: &ConsumerAttribute, data: &Map<String, Value>) -> Result<Value> {
    match attr.mapping_type {
        MappingType::Direct => {
            let source = attr
                .producer_attribute_key
                .as_deref()
                .filter(|k| !k.is_empty())
                .ok_or_else(|| mapping_error(attr, "direct mapping has no producerAttributeKey"))?;
            Ok(data.get(source).cloned().unwrap_or(Value::Null))
        }
        MappingType::Hardcoded => attr
            .value
            .clone()
            .ok_or_else(|| mapping_error(attr, "hardcoded mapping has no value")),
        MappingType::Expression => {
            let expression = attr
                .expression
                .as_deref()
                .filter(|e| !e.trim().is_empty())
                .ok_or_else(|| mapping_error(attr, "expression mapping has no expression"))?;
            Ok(try_evaluate_expression(expression, data)?)
        }
    }
}

fn mapping_error(attr: &ConsumerAttribute, message: &str) -> Error {
    Error::Mapping {
        key: attr.key.clone(),
        message: message.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consumer::NewConsumer;
    use crate::producer::{Attribute, AttributeType, NewProducer, Status};
    use crate::validate::validate_payload;
    use serde_json::json;

    fn producer() -> Producer {
        Producer::create(NewProducer {
            id: Some("orders".to_string()),
            name: "Orders".to_string(),
            description: None,
            attributes: vec![
                Attribute::new("orderId", AttributeType::Int),
                Attribute::new("customer", AttributeType::Object),
                Attribute::new("items", AttributeType::Array),
                Attribute::new("note", AttributeType::String),
            ],
            status: Status::Active,
        })
    }

    fn consumer(attributes: Vec<ConsumerAttribute>) -> Consumer {
        Consumer::create(NewConsumer {
            id: Some("shipping".to_string()),
            producer_id: "orders".to_string(),
            name: "Shipping".to_string(),
            webhook_url: "https://hooks.example.com/ship".to_string(),
            attributes,
            status: Status::Active,
        })
    }

    fn payload() -> Map<String, Value> {
        json!({
            "orderId": 1001,
            "customer": {"name": "Ada", "address": {"zip": "02134"}},
            "items": [{"sku": "A1", "qty": 2}, {"sku": "B2", "qty": 1}],
            "note": "leave at door"
        })
        .as_object()
        .cloned()
        .unwrap()
    }

    #[test]
    fn test_each_mapping_type() {
        let consumer = consumer(vec![
            ConsumerAttribute::direct("id", AttributeType::Int, "orderId"),
            ConsumerAttribute::hardcoded("carrier", AttributeType::String, json!("UPS")),
            ConsumerAttribute::expression("zip", AttributeType::String, "${customer.address.zip}"),
            ConsumerAttribute::expression("count", AttributeType::Int, "${items}.length * 10"),
        ]);
        let output = transform_payload(&payload(), &consumer, &producer());
        assert_eq!(
            Value::Object(output),
            json!({"id": 1001, "carrier": "UPS", "zip": "02134", "count": 20})
        );
    }

    #[test]
    fn test_missing_direct_source_is_null_and_isolated() {
        let consumer = consumer(vec![
            ConsumerAttribute::direct("ghost", AttributeType::String, "doesNotExist"),
            ConsumerAttribute::direct("id", AttributeType::Int, "orderId"),
        ]);
        let (output, diagnostics) = transform_with_diagnostics(&payload(), &consumer, &producer());
        assert_eq!(output["ghost"], Value::Null);
        assert_eq!(output["id"], json!(1001));
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn test_misconfigured_mappings_become_null() {
        let mut no_source = ConsumerAttribute::direct("a", AttributeType::Int, "orderId");
        no_source.producer_attribute_key = None;
        let mut no_value = ConsumerAttribute::hardcoded("b", AttributeType::Int, json!(1));
        no_value.value = None;
        let consumer = consumer(vec![
            no_source,
            no_value,
            ConsumerAttribute::expression("c", AttributeType::Int, "${orderId} +"),
            ConsumerAttribute::expression("d", AttributeType::Int, "${orderId}; drop()"),
            ConsumerAttribute::direct("e", AttributeType::String, "note"),
        ]);
        let (output, diagnostics) = transform_with_diagnostics(&payload(), &consumer, &producer());
        assert_eq!(
            Value::Object(output),
            json!({"a": null, "b": null, "c": null, "d": null, "e": "leave at door"})
        );
        let keys: Vec<_> = diagnostics.iter().map(|d| d.key.as_str()).collect();
        assert_eq!(keys, vec!["a", "b", "c", "d"]);
        assert!(diagnostics[3].message.contains("forbidden"));
    }

    #[test]
    fn test_hardcoded_null_literal_maps_without_diagnostic() {
        let attr: ConsumerAttribute = serde_json::from_value(json!({
            "key": "note",
            "type": "string",
            "mappingType": "hardcoded",
            "value": null
        }))
        .unwrap();
        let consumer = consumer(vec![attr]);
        let (output, diagnostics) = transform_with_diagnostics(&payload(), &consumer, &producer());
        assert_eq!(Value::Object(output), json!({"note": null}));
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn test_output_follows_declaration_order() {
        let consumer = consumer(vec![
            ConsumerAttribute::direct("z", AttributeType::String, "note"),
            ConsumerAttribute::hardcoded("a", AttributeType::Int, json!(1)),
            ConsumerAttribute::direct("m", AttributeType::Int, "orderId"),
        ]);
        let output = transform_payload(&payload(), &consumer, &producer());
        let keys: Vec<_> = output.keys().cloned().collect();
        assert_eq!(keys, vec!["z", "a", "m"]);
    }

    #[test]
    fn test_unmapped_attributes_excluded() {
        let consumer = consumer(vec![ConsumerAttribute::direct(
            "id",
            AttributeType::Int,
            "orderId",
        )]);
        let output = transform_payload(&payload(), &consumer, &producer());
        assert_eq!(output.len(), 1);
        assert!(!output.contains_key("note"));
    }

    #[test]
    fn test_direct_round_trip_preserves_values() {
        let source = payload();
        assert!(validate_payload(&Value::Object(source.clone()), &producer()).valid);
        let attributes = producer()
            .attributes
            .iter()
            .map(|a| ConsumerAttribute::direct(a.key.clone(), a.attr_type, a.key.clone()))
            .collect();
        let output = transform_payload(&source, &consumer(attributes), &producer());
        assert_eq!(output, source);
    }

    #[test]
    fn test_hardcoded_value_verbatim() {
        let literal = json!({"nested": [1, "two", null]});
        let consumer = consumer(vec![ConsumerAttribute::hardcoded(
            "meta",
            AttributeType::Object,
            literal.clone(),
        )]);
        let output = transform_payload(&Map::new(), &consumer, &producer());
        assert_eq!(output["meta"], literal);
    }
}
