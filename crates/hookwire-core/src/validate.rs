//! Type and payload validation
//!
//! Payload validation is fail-slow: every violation is collected so the
//! caller can display them all at once.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;

use crate::consumer::{MappingType, NewConsumer};
use crate::error::{Error, Result};
use crate::expression::Expression;
use crate::producer::{AttributeType, NewProducer, Producer};

/// Outcome of [`validate_payload`]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ValidationResult {
    /// True iff `errors` is empty
    pub valid: bool,
    /// Violations in schema order
    pub errors: Vec<String>,
}

impl ValidationResult {
    /// Build a result from collected violations
    pub fn from_errors(errors: Vec<String>) -> Self {
        Self {
            valid: errors.is_empty(),
            errors,
        }
    }
}

/// Check a value against a declared attribute type
pub fn validate_type(value: &Value, attr_type: AttributeType) -> bool {
    match attr_type {
        AttributeType::Int => is_integer(value),
        AttributeType::String => value.is_string(),
        AttributeType::Object => value.is_object(),
        AttributeType::Array => value.is_array(),
    }
}

/// Check a value against a type name.
///
/// Names outside the `int | string | object | array` vocabulary are
/// accepted without checking.
pub fn validate_type_name(value: &Value, type_name: &str) -> bool {
    AttributeType::from_name(type_name).is_none_or(|t| validate_type(value, t))
}

fn is_integer(value: &Value) -> bool {
    match value {
        Value::Number(n) => {
            n.is_i64()
                || n.is_u64()
                || n.as_f64().is_some_and(|f| f.is_finite() && f.fract() == 0.0)
        }
        _ => false,
    }
}

/// Runtime type name reported in validation messages.
///
/// Arrays and null report `object`, like a JavaScript `typeof`.
pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Null | Value::Array(_) | Value::Object(_) => "object",
    }
}

/// Check a payload against a producer schema, collecting every violation
pub fn validate_payload(payload: &Value, producer: &Producer) -> ValidationResult {
    let mut errors = Vec::new();
    for attr in &producer.attributes {
        let Some(value) = payload.get(&attr.key) else {
            errors.push(format!("Missing required attribute: {}", attr.key));
            continue;
        };
        if !validate_type(value, attr.attr_type) {
            errors.push(format!(
                "Invalid type for {}: expected {}, got {}",
                attr.key,
                attr.attr_type,
                json_type_name(value)
            ));
        }
    }
    ValidationResult::from_errors(errors)
}

/// Fill attributes absent from `payload` with their declared default.
///
/// Present keys are never overwritten.
pub fn apply_defaults(payload: &mut Map<String, Value>, producer: &Producer) {
    for attr in &producer.attributes {
        if let Some(default) = &attr.default_value
            && !payload.contains_key(&attr.key)
        {
            payload.insert(attr.key.clone(), default.clone());
        }
    }
}

/// Starter payload: each attribute's default, or its type's zero value
pub fn sample_payload(producer: &Producer) -> Map<String, Value> {
    producer
        .attributes
        .iter()
        .map(|attr| {
            let value = attr
                .default_value
                .clone()
                .unwrap_or_else(|| attr.attr_type.zero_value());
            (attr.key.clone(), value)
        })
        .collect()
}

/// Save-time producer check: non-empty name, unique non-empty keys,
/// defaults matching their declared type.
pub fn validate_producer(producer: &NewProducer) -> Result<()> {
    let mut errors = Vec::new();
    if producer.name.trim().is_empty() {
        errors.push("name must not be empty".to_string());
    }
    let mut seen = HashSet::new();
    for attr in &producer.attributes {
        if attr.key.trim().is_empty() {
            errors.push("attribute key must not be empty".to_string());
            continue;
        }
        if !seen.insert(attr.key.as_str()) {
            errors.push(format!("duplicate attribute key: {}", attr.key));
        }
        if let Some(default) = &attr.default_value
            && !validate_type(default, attr.attr_type)
        {
            errors.push(format!(
                "default for {} is not of type {}",
                attr.key, attr.attr_type
            ));
        }
    }
    if errors.is_empty() {
        Ok(())
    } else {
        Err(Error::InvalidProducer {
            producer: producer.name.clone(),
            errors,
        })
    }
}

/// Save-time consumer check against the producer it subscribes to.
///
/// Rejects mapping field sets that do not match the mapping type,
/// `direct` keys missing from the producer schema, expressions that do
/// not parse or reference unknown attributes, and duplicate output keys.
pub fn validate_consumer(consumer: &NewConsumer, producer: &Producer) -> Result<()> {
    let mut errors = Vec::new();
    if consumer.name.trim().is_empty() {
        errors.push("name must not be empty".to_string());
    }
    if consumer.webhook_url.trim().is_empty() {
        errors.push("webhookUrl must not be empty".to_string());
    }
    if consumer.producer_id != producer.id {
        errors.push(format!(
            "producerId {} does not match producer {}",
            consumer.producer_id, producer.id
        ));
    }

    let mut seen = HashSet::new();
    for attr in &consumer.attributes {
        if attr.key.trim().is_empty() {
            errors.push("attribute key must not be empty".to_string());
            continue;
        }
        if !seen.insert(attr.key.as_str()) {
            errors.push(format!("duplicate attribute key: {}", attr.key));
        }
        let field_errors = attr.check();
        if !field_errors.is_empty() {
            errors.extend(field_errors);
            continue;
        }

        match attr.mapping_type {
            MappingType::Direct => {
                if let Some(source) = &attr.producer_attribute_key
                    && producer.attribute(source).is_none()
                {
                    errors.push(format!(
                        "{}: producer has no attribute '{}'",
                        attr.key, source
                    ));
                }
            }
            MappingType::Expression => {
                let source = attr.expression.as_deref().unwrap_or_default();
                match Expression::parse(source) {
                    Ok(expr) => {
                        for path in expr.placeholders() {
                            let root = path.split('.').next().unwrap_or(path.as_str());
                            if producer.attribute(root).is_none() {
                                errors.push(format!(
                                    "{}: expression references unknown attribute '{}'",
                                    attr.key, root
                                ));
                            }
                        }
                        for name in expr.unbound_identifiers() {
                            errors.push(format!(
                                "{}: '{}' is not inside a ${{...}} placeholder and never resolves",
                                attr.key, name
                            ));
                        }
                    }
                    Err(e) => errors.push(format!("{}: {}", attr.key, e)),
                }
            }
            MappingType::Hardcoded => {}
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(Error::InvalidConsumer {
            consumer: consumer.name.clone(),
            errors,
        })
    }
}
