//! Consumer definitions and attribute mappings
//!
//! A consumer is a webhook subscriber bound to one producer. Each consumer
//! attribute declares how its value is derived from the producer payload.
//!
//! # Mapping Types
//!
//! - `direct` - copy `producerAttributeKey` from the payload
//! - `hardcoded` - emit the stored `value` verbatim
//! - `expression` - evaluate `expression` against the payload
//!
//! # Example
//!
//! ```yaml
//! name: Send Email
//! producerId: signups
//! webhookUrl: https://hooks.example.com/email
//! attributes:
//!   - key: recipient
//!     type: string
//!     mappingType: direct
//!     producerAttributeKey: email
//!   - key: doubled
//!     type: int
//!     mappingType: expression
//!     expression: "${userId} * 2"
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;

use crate::producer::{AttributeType, Status};

/// Strategy used to derive a consumer attribute
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum MappingType {
    /// Copy a producer attribute
    Direct,
    /// Fixed literal
    Hardcoded,
    /// Computed expression
    Expression,
}

impl MappingType {
    /// Wire name of the mapping type
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Direct => "direct",
            Self::Hardcoded => "hardcoded",
            Self::Expression => "expression",
        }
    }
}

impl fmt::Display for MappingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One consumer attribute and its mapping rule
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ConsumerAttribute {
    /// Output key
    pub key: String,

    /// Declared output type
    #[serde(rename = "type")]
    pub attr_type: AttributeType,

    /// Mapping strategy
    pub mapping_type: MappingType,

    /// Source key, only for `direct`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub producer_attribute_key: Option<String>,

    /// Literal, only for `hardcoded`. A present `null` is `Some(Value::Null)`.
    #[serde(
        default,
        deserialize_with = "present_value",
        skip_serializing_if = "Option::is_none"
    )]
    pub value: Option<Value>,

    /// Expression text, only for `expression`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expression: Option<String>,
}

fn present_value<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

impl ConsumerAttribute {
    /// Direct copy of a producer attribute
    pub fn direct(
        key: impl Into<String>,
        attr_type: AttributeType,
        producer_key: impl Into<String>,
    ) -> Self {
        Self {
            key: key.into(),
            attr_type,
            mapping_type: MappingType::Direct,
            producer_attribute_key: Some(producer_key.into()),
            value: None,
            expression: None,
        }
    }

    /// Fixed literal value
    pub fn hardcoded(key: impl Into<String>, attr_type: AttributeType, value: Value) -> Self {
        Self {
            key: key.into(),
            attr_type,
            mapping_type: MappingType::Hardcoded,
            producer_attribute_key: None,
            value: Some(value),
            expression: None,
        }
    }

    /// Computed expression
    pub fn expression(
        key: impl Into<String>,
        attr_type: AttributeType,
        expression: impl Into<String>,
    ) -> Self {
        Self {
            key: key.into(),
            attr_type,
            mapping_type: MappingType::Expression,
            producer_attribute_key: None,
            value: None,
            expression: Some(expression.into()),
        }
    }

    /// Check that the populated fields match the mapping type exactly.
    ///
    /// Returns one message per violation.
    pub fn check(&self) -> Vec<String> {
        let mut errors = Vec::new();
        let has_source = self
            .producer_attribute_key
            .as_deref()
            .is_some_and(|k| !k.is_empty());
        let has_value = self.value.is_some();
        let has_expression = self
            .expression
            .as_deref()
            .is_some_and(|e| !e.trim().is_empty());

        let expected = [
            (MappingType::Direct, has_source, "producerAttributeKey"),
            (MappingType::Hardcoded, has_value, "value"),
            (MappingType::Expression, has_expression, "expression"),
        ];
        for (mapping, present, field) in expected {
            if mapping == self.mapping_type && !present {
                errors.push(format!(
                    "{}: {} mapping requires {}",
                    self.key, self.mapping_type, field
                ));
            } else if mapping != self.mapping_type && present {
                errors.push(format!(
                    "{}: {} is not allowed for {} mapping",
                    self.key, field, self.mapping_type
                ));
            }
        }
        errors
    }
}

/// A stored consumer
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Consumer {
    /// Generated identifier
    pub id: String,

    /// Producer this consumer subscribes to
    pub producer_id: String,

    /// Display name
    pub name: String,

    /// Delivery target
    pub webhook_url: String,

    /// Ordered attribute mappings
    #[serde(default)]
    pub attributes: Vec<ConsumerAttribute>,

    /// Lifecycle status
    #[serde(default)]
    pub status: Status,

    /// Creation time
    pub created_at: DateTime<Utc>,

    /// Last delivery attempt
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_triggered: Option<DateTime<Utc>>,
}

impl Consumer {
    /// Materialize a consumer from a creation request
    pub fn create(input: NewConsumer) -> Self {
        let id = input
            .id
            .clone()
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(crate::generate_id);
        Self {
            id,
            producer_id: input.producer_id,
            name: input.name,
            webhook_url: input.webhook_url,
            attributes: input.attributes,
            status: input.status,
            created_at: Utc::now(),
            last_triggered: None,
        }
    }

    /// Replace the editable fields, keeping id and timestamps
    pub fn apply(&mut self, input: NewConsumer) {
        self.producer_id = input.producer_id;
        self.name = input.name;
        self.webhook_url = input.webhook_url;
        self.attributes = input.attributes;
        self.status = input.status;
    }
}

/// Consumer creation or replacement request
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NewConsumer {
    /// Fixed id, used by definition files
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Producer this consumer subscribes to
    pub producer_id: String,

    /// Display name
    pub name: String,

    /// Delivery target
    pub webhook_url: String,

    /// Ordered attribute mappings
    #[serde(default)]
    pub attributes: Vec<ConsumerAttribute>,

    /// Lifecycle status
    #[serde(default)]
    pub status: Status,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_consumer_definition() {
        let yaml = r#"
name: Send Email
producerId: signups
webhookUrl: https://hooks.example.com/email
attributes:
  - key: recipient
    type: string
    mappingType: direct
    producerAttributeKey: email
  - key: source
    type: string
    mappingType: hardcoded
    value: signup-form
  - key: doubled
    type: int
    mappingType: expression
    expression: "${userId} * 2"
"#;
        let input: NewConsumer = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(input.producer_id, "signups");
        assert_eq!(input.attributes.len(), 3);
        assert_eq!(input.attributes[0].mapping_type, MappingType::Direct);
        assert_eq!(
            input.attributes[0].producer_attribute_key.as_deref(),
            Some("email")
        );
        assert_eq!(input.attributes[1].value, Some(json!("signup-form")));
        assert_eq!(
            input.attributes[2].expression.as_deref(),
            Some("${userId} * 2")
        );
    }

    #[test]
    fn test_check_accepts_well_formed_mappings() {
        assert!(
            ConsumerAttribute::direct("a", AttributeType::Int, "b")
                .check()
                .is_empty()
        );
        assert!(
            ConsumerAttribute::hardcoded("a", AttributeType::String, json!("x"))
                .check()
                .is_empty()
        );
        assert!(
            ConsumerAttribute::expression("a", AttributeType::Int, "${b} + 1")
                .check()
                .is_empty()
        );
    }

    #[test]
    fn test_hardcoded_null_literal_is_kept() {
        let attr: ConsumerAttribute = serde_json::from_value(json!({
            "key": "cleared",
            "type": "string",
            "mappingType": "hardcoded",
            "value": null
        }))
        .unwrap();
        assert_eq!(attr.value, Some(Value::Null));
        assert!(attr.check().is_empty());

        let stored = serde_json::to_value(&attr).unwrap();
        assert_eq!(stored.get("value"), Some(&Value::Null));
        let reloaded: ConsumerAttribute = serde_json::from_value(stored).unwrap();
        assert_eq!(reloaded, attr);

        let from_yaml: ConsumerAttribute =
            serde_yaml::from_str("key: k\ntype: int\nmappingType: hardcoded\nvalue: null\n")
                .unwrap();
        assert_eq!(from_yaml.value, Some(Value::Null));
    }

    #[test]
    fn test_absent_value_stays_none() {
        let attr: ConsumerAttribute = serde_json::from_value(json!({
            "key": "k",
            "type": "int",
            "mappingType": "hardcoded"
        }))
        .unwrap();
        assert_eq!(attr.value, None);
        assert_eq!(attr.check(), vec!["k: hardcoded mapping requires value"]);
    }

    #[test]
    fn test_check_direct_without_source_key() {
        let mut attr = ConsumerAttribute::direct("out", AttributeType::Int, "x");
        attr.producer_attribute_key = None;
        let errors = attr.check();
        assert_eq!(errors, vec!["out: direct mapping requires producerAttributeKey"]);
    }

    #[test]
    fn test_check_extra_fields_reported() {
        let mut attr = ConsumerAttribute::hardcoded("out", AttributeType::Int, json!(1));
        attr.expression = Some("${a}".to_string());
        attr.producer_attribute_key = Some("a".to_string());
        let errors = attr.check();
        assert_eq!(errors.len(), 2);
        assert!(errors[0].contains("producerAttributeKey is not allowed"));
        assert!(errors[1].contains("expression is not allowed"));
    }

    #[test]
    fn test_consumer_serializes_without_empty_optionals() {
        let consumer = Consumer::create(NewConsumer {
            id: None,
            producer_id: "p".to_string(),
            name: "c".to_string(),
            webhook_url: "http://localhost/hook".to_string(),
            attributes: vec![ConsumerAttribute::direct("a", AttributeType::Int, "a")],
            status: Status::Active,
        });
        let value = serde_json::to_value(&consumer).unwrap();
        assert_eq!(value["producerId"], "p");
        assert_eq!(value["webhookUrl"], "http://localhost/hook");
        assert_eq!(value["attributes"][0]["mappingType"], "direct");
        assert!(value["attributes"][0].get("value").is_none());
        assert!(value.get("lastTriggered").is_none());
    }
}
